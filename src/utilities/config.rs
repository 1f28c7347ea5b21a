use std::num::{ParseFloatError, ParseIntError};
use std::{env, fmt};

use url::Url;

pub const DEFAULT_MODEL: &str = "meta.llama3-70b-instruct-v1:0";

const DEFAULT_MAX_GEN_LEN: u16 = 512;
const DEFAULT_TEMPERATURE: f32 = 0.5;

pub struct Config {
    pub endpoint: Url,
    pub api_key: Option<String>,
    pub model: String,
    pub max_gen_len: u16,
    pub temperature: f32,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingEndpoint,
    InvalidEndpoint(url::ParseError),
    InvalidMaxGenLen(ParseIntError),
    InvalidTemperature(ParseFloatError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEndpoint => write!(f, "LLAMA_ENDPOINT is not set"),
            Self::InvalidEndpoint(err) => write!(f, "LLAMA_ENDPOINT is not a valid URL: {err}"),
            Self::InvalidMaxGenLen(err) => write!(f, "LLAMA_MAX_GEN_LEN: {err}"),
            Self::InvalidTemperature(err) => write!(f, "LLAMA_TEMPERATURE: {err}"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = lookup("LLAMA_ENDPOINT").ok_or(ConfigError::MissingEndpoint)?;
        let endpoint = Url::parse(&endpoint).map_err(ConfigError::InvalidEndpoint)?;

        let max_gen_len = match lookup("LLAMA_MAX_GEN_LEN") {
            Some(value) => value.parse().map_err(ConfigError::InvalidMaxGenLen)?,
            None => DEFAULT_MAX_GEN_LEN,
        };

        let temperature = match lookup("LLAMA_TEMPERATURE") {
            Some(value) => value.parse().map_err(ConfigError::InvalidTemperature)?,
            None => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            endpoint,
            api_key: lookup("LLAMA_API_KEY"),
            model: lookup("LLAMA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            max_gen_len,
            temperature,
        })
    }
}
