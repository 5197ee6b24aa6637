//! Worker process: claims and executes jobs against the shared Postgres
//! store until a shutdown signal arrives, then drains in-flight work.

use std::sync::Arc;

use jobq_core::HandlerRegistry;
use jobq_server::{bootstrap_store, EmailHandler, ImageProcessingHandler, ReportGenerationHandler, Settings};
use jobq_worker::{install_shutdown_signal, WorkerRuntime};

#[tokio::main]
async fn main() {
    Settings::init_logging();

    if let Err(error) = run().await {
        tracing::error!(%error, "worker exited with a fatal error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    let store = bootstrap_store(&settings.db_url).await?;

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(EmailHandler));
    registry.register(Arc::new(ReportGenerationHandler));
    registry.register(Arc::new(ImageProcessingHandler));

    let runtime = WorkerRuntime::new(Arc::new(store), Arc::new(registry), settings.worker);
    install_shutdown_signal(runtime.shutdown_handle());

    let stats = runtime.start().await;
    tracing::info!(
        processed = stats.processed,
        succeeded = stats.succeeded,
        failed = stats.failed,
        "worker exited cleanly"
    );

    Ok(())
}
