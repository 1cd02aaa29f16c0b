use anyhow::Result;
use facebridge_core::ModelGate;
use facebridged::transport::{spawn_line_reader, LineOutbound};
use facebridged::{Config, Gateway, Outbound};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the host channel, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    tracing::info!(
        model_dir = %config.model_dir.display(),
        preload = config.preload,
        "facebridged starting"
    );

    let gate = Arc::new(ModelGate::new(config.loader()));
    let outbound: Arc<dyn Outbound> = Arc::new(LineOutbound::new(std::io::stdout()));
    let gateway = Arc::new(Gateway::new(gate, Some(outbound)));

    if config.preload {
        // Requests arriving meanwhile wait on the same in-flight load.
        let gateway = Arc::clone(&gateway);
        let warmup = config.warmup_image.clone();
        tokio::spawn(async move {
            if let Err(err) = gateway.preload(warmup.as_ref()).await {
                tracing::warn!(error = %err, "preload failed; models will load on first request");
            }
        });
    }

    let inbound = spawn_line_reader(tokio::io::stdin());
    tokio::select! {
        _ = gateway.run(inbound) => tracing::info!("host channel closed"),
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("facebridged shutting down");
        }
    }

    Ok(())
}
