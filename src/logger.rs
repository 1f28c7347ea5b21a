use colored::{Color, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use time::macros::format_description;

/// Writes to stderr so the generated text on stdout stays clean.
struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        match metadata.target().split("::").next().unwrap() {
            "llama_stream" => true,
            _ => metadata.level() <= Level::Info,
        }
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = time::OffsetDateTime::now_utc()
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap();

        let color = match record.level() {
            Level::Error => Color::BrightRed,
            Level::Warn => Color::BrightYellow,
            Level::Info => Color::BrightCyan,
            Level::Debug => Color::Magenta,
            Level::Trace => Color::Green,
        };

        eprintln!(
            "{} {} {}",
            timestamp.color(Color::BrightBlack),
            record.level().as_str().color(color),
            record.args()
        );
    }

    fn flush(&self) {}
}

pub fn init() {
    log::set_boxed_logger(Box::new(Logger)).unwrap();
    log::set_max_level(LevelFilter::Debug);
}
