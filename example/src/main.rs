use std::env;
use std::error::Error;

use tracing_appender::non_blocking::WorkerGuard;

mod secrets;

const APPLICATION_NAME: &str = "vault-sdk-example";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _guard = init_logger()?;

    let client = secrets::setup(APPLICATION_NAME).await?;

    let path = env::var("SECRET_PATH").unwrap_or_else(|_| "app/config".to_string());
    let secret = client.kv2().read(&path).await?;
    tracing::info!(
        path = %path,
        version = secret.metadata.version,
        keys = ?secret.data.keys().collect::<Vec<_>>(),
        "Read secret"
    );

    if let Ok(key) = env::var("TRANSIT_KEY") {
        secrets::transit_roundtrip(&client, &key).await?;
    }

    secrets::watch(client, path).await;
    Ok(())
}

fn init_logger() -> Result<Option<WorkerGuard>, Box<dyn Error>> {
    use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
    use tracing_log::LogTracer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{EnvFilter, Registry};

    if !env::var("JSON_LOG").is_ok_and(|s| s.parse().unwrap_or_default()) {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
        return Ok(None);
    }

    // Redirect the logs from log library to tracing's subscribers.
    LogTracer::init()?;

    let app_name = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION")).to_string();

    // Non-blocking stdout writer
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);
    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(JsonStorageLayer)
        .with(bunyan_formatting_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(Some(guard))
}
