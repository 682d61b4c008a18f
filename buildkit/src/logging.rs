use std::io::Write;

use env_logger::{Target, WriteStyle};
use log::{Level, LevelFilter};

/// Installs the global logger, writing plain lines to stdout at `info` unless
/// `RUST_LOG` says otherwise.
pub fn init() {
    let mut builder = pretty_env_logger::formatted_builder();
    builder
        .target(Target::Stdout)
        .write_style(WriteStyle::Never)
        .filter_level(LevelFilter::Info)
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                line(record.level(), record.target(), &record.args().to_string())
            )
        });

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    // A second call (e.g. from tests) keeps the first logger.
    let _ = builder.try_init();
}

/// Progress is the bare message; problems carry a label, debugging output
/// its target.
fn line(level: Level, target: &str, message: &str) -> String {
    match level {
        Level::Info => message.to_owned(),
        Level::Warn => format!("Warning: {message}"),
        Level::Error => format!("Error: {message}"),
        Level::Debug | Level::Trace => format!("[{level} {target}] {message}"),
    }
}
