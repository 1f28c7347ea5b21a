use std::io::{self, Write};
use std::time::Duration;
use std::{env, process};

use reqwest::Client;
use tokio::sync::mpsc;

use crate::apis::llama::{self, ChunkResponse, InvocationError, InvokeRequest};
use crate::utilities::config::Config;

mod apis;
mod logger;
mod prompt;
mod utilities;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logger::init();
    dotenvy::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            log::error!("invalid configuration: {err}");
            process::exit(1);
        }
    };

    let prompt = env::args().skip(1).collect::<Vec<_>>().join(" ");

    if prompt.is_empty() {
        log::error!("usage: llama-stream <prompt>");
        process::exit(1);
    }

    let http_client = Client::builder().timeout(Duration::from_secs(300)).build().unwrap();

    let request = InvokeRequest {
        prompt: prompt::llama3_instruct(&prompt),
        max_gen_len: config.max_gen_len,
        temperature: config.temperature,
    };

    log::info!("invoking {} at {}", config.model, config.endpoint);

    let model = config.model.clone();
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        llama::invoke_with_response_stream(
            http_client,
            tx,
            &config.endpoint,
            config.api_key.as_deref(),
            &config.model,
            &request,
        )
        .await;
    });

    if let Err(err) = print_stream(&mut rx, &mut io::stdout()).await {
        log::error!("{}", failure_message(&model, &err));
        process::exit(1);
    }
}

/// Drains the stream, writing each text fragment as soon as it arrives.
/// Metadata-only chunks are skipped; the loop ends when the remote side
/// closes the stream.
async fn print_stream(
    rx: &mut mpsc::UnboundedReceiver<Result<ChunkResponse, InvocationError>>,
    output: &mut impl Write,
) -> Result<(), InvocationError> {
    while let Some(chunk) = rx.recv().await {
        let chunk = chunk?;

        if let Some(generation) = chunk.generation {
            output.write_all(generation.as_bytes())?;
            output.flush()?;
        }

        if let Some(stop_reason) = chunk.stop_reason {
            log::debug!(
                "generation stopped: {stop_reason} ({} tokens)",
                chunk.generation_token_count.unwrap_or_default()
            );
        }
    }

    Ok(())
}

fn failure_message(model: &str, err: &InvocationError) -> String {
    format!("can't invoke '{model}': {err}")
}
