//! Process-wide configuration, loaded once from the environment (with
//! `.env` support) for both the `server` and `worker` binaries.

use jobq_worker::WorkerConfig;

/// Address the producer HTTP surface binds to by default.
const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_url: String,
    pub http_bind: String,
    pub worker: WorkerConfig,
}

impl Settings {
    /// Load from the environment, applying `.env` first if present. Parsing
    /// failures (bad worker knobs) abort with a descriptive error; a missing
    /// `DB_URL` is itself an error since there's no sensible default.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let db_url = std::env::var("DB_URL").map_err(|_| anyhow::anyhow!("DB_URL must be set"))?;
        let http_bind = std::env::var("HTTP_BIND").unwrap_or_else(|_| DEFAULT_HTTP_BIND.to_string());
        let worker = WorkerConfig::from_env()?;

        Ok(Self { db_url, http_bind, worker })
    }

    /// Initialize the global tracing subscriber from `RUST_LOG` (default
    /// `info`), writing structured logs to stdout.
    pub fn init_logging() {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt().with_env_filter(filter).init();
    }
}
