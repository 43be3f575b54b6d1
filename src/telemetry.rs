use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

/// Installs the global subscriber: bunyan JSON lines on stdout, filtered by
/// `RUST_LOG`, with `log` records from actix forwarded into `tracing`.
pub fn init_subscriber(app_name: &str, default_filter: &str) -> anyhow::Result<()> {
    LogTracer::init()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let formatting_layer = BunyanFormattingLayer::new(app_name.to_string(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
