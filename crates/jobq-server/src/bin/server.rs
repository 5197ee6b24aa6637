//! Producer HTTP surface: the process operators and application code talk to
//! for enqueuing, inspecting, and administering jobs.

use std::sync::Arc;

use jobq_server::{bootstrap_store, JobService, Settings};

#[tokio::main]
async fn main() {
    Settings::init_logging();

    if let Err(error) = run().await {
        tracing::error!(%error, "server exited with a fatal error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    let store = bootstrap_store(&settings.db_url).await?;
    let service = Arc::new(JobService::new(Arc::new(store)));
    let router = jobq_server::build_router(service);

    let listener = tokio::net::TcpListener::bind(&settings.http_bind).await?;
    tracing::info!(bind = %settings.http_bind, "producer API listening");
    axum::serve(listener, router).await?;

    Ok(())
}
