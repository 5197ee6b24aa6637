//! Worker tuning knobs, loaded from the environment.

use std::time::Duration;

/// Per-process worker configuration (§6 Worker configuration).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub queues: Vec<String>,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub backoff_factor: f64,
    pub max_concurrent_jobs: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: hostname_or_default(),
            queues: vec!["default".to_string()],
            poll_interval: Duration::from_secs_f64(1.0),
            max_poll_interval: Duration::from_secs_f64(30.0),
            backoff_factor: 1.5,
            max_concurrent_jobs: 3,
        }
    }
}

impl WorkerConfig {
    /// Load from environment variables, falling back to the defaults of §6
    /// for anything unset. Returns an error only if a set variable fails to
    /// parse as its expected type.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let worker_id = std::env::var("WORKER_ID").unwrap_or(defaults.worker_id);

        let queues = match std::env::var("WORKER_QUEUES") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.queues,
        };

        let poll_interval = parse_secs_env("POLL_INTERVAL", defaults.poll_interval)?;
        let max_poll_interval = parse_secs_env("MAX_POLL_INTERVAL", defaults.max_poll_interval)?;

        let backoff_factor = match std::env::var("BACKOFF_FACTOR") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("BACKOFF_FACTOR must be a float: '{raw}'"))?,
            Err(_) => defaults.backoff_factor,
        };

        let max_concurrent_jobs = match std::env::var("MAX_CONCURRENT_JOBS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_CONCURRENT_JOBS must be a positive integer: '{raw}'"))?,
            Err(_) => defaults.max_concurrent_jobs,
        };

        if queues.is_empty() {
            anyhow::bail!("WORKER_QUEUES must name at least one queue");
        }
        if max_concurrent_jobs == 0 {
            anyhow::bail!("MAX_CONCURRENT_JOBS must be at least 1");
        }
        if backoff_factor <= 1.0 {
            anyhow::bail!("BACKOFF_FACTOR must be greater than 1.0");
        }

        Ok(Self {
            worker_id,
            queues,
            poll_interval,
            max_poll_interval,
            backoff_factor,
            max_concurrent_jobs,
        })
    }
}

fn parse_secs_env(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs: f64 = raw.parse().map_err(|_| anyhow::anyhow!("{key} must be a float: '{raw}'"))?;
            Ok(Duration::from_secs_f64(secs))
        }
        Err(_) => Ok(default),
    }
}

fn hostname_or_default() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "worker-1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = WorkerConfig::default();
        assert_eq!(config.queues, vec!["default".to_string()]);
        assert_eq!(config.poll_interval, Duration::from_secs_f64(1.0));
        assert_eq!(config.max_poll_interval, Duration::from_secs_f64(30.0));
        assert_eq!(config.backoff_factor, 1.5);
        assert_eq!(config.max_concurrent_jobs, 3);
    }
}
