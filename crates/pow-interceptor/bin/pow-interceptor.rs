use std::{
    fs::OpenOptions,
    sync::Arc,
};

use anyhow::Result;
use clap::Parser;
use pow_interceptor::{
    Config,
    InterceptorServer,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(&config)?;

    let server = config.build().await?;
    let cancellation_token = CancellationToken::new();

    run_server(server, cancellation_token).await;
    Ok(())
}

/// Logs to stdout and, if configured, appends a copy to the log file.
fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy();

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

async fn run_server(server: InterceptorServer, cancellation_token: CancellationToken) {
    let mut boxed_server_future = Box::pin(server.run(cancellation_token.clone()));

    tokio::select! {
        result = &mut boxed_server_future => {
           handle_server_result(result);
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C signal, initiating graceful shutdown");
            cancellation_token.cancel();
            handle_server_result(boxed_server_future.await);
        }
    }
}

/// Handle the result of the server
fn handle_server_result(result: Result<()>) {
    match result {
        Ok(()) => tracing::info!("Server shutdown gracefully"),
        Err(e) => {
            tracing::error!("Server encountered an error: {}", e);
        }
    }
}
