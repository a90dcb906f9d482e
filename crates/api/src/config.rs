use std::fmt;
use std::str::FromStr;

use crawlq_core::policy::{QueuePolicy, DEFAULT_MAX_RETRIES};

/// Which storage engine backs the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL via `DATABASE_URL`.
    Postgres,
    /// In-process store; state is lost on restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        })
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long in-flight requests may drain after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Storage engine (default: `postgres`).
    pub store_backend: StoreBackend,
    /// Required when `store_backend` is `postgres`.
    pub database_url: Option<String>,
    /// Pool size for the PostgreSQL engine (default: `20`).
    pub db_max_connections: u32,
    /// Failures before a task is parked as failed; `0` = unlimited (default: `3`).
    pub task_max_retries: u32,
    /// Claim lease in seconds; `0` disables expiry (default: `0`).
    pub task_lease_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `STORE_BACKEND`        | `postgres`                 |
    /// | `DATABASE_URL`         | (none)                     |
    /// | `DB_MAX_CONNECTIONS`   | `20`                       |
    /// | `TASK_MAX_RETRIES`     | `3`                        |
    /// | `TASK_LEASE_SECS`      | `0`                        |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = parse_var("PORT", "3000");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse_var("REQUEST_TIMEOUT_SECS", "30");
        let shutdown_timeout_secs: u64 = parse_var("SHUTDOWN_TIMEOUT_SECS", "30");
        let store_backend: StoreBackend = parse_var("STORE_BACKEND", "postgres");
        let database_url = std::env::var("DATABASE_URL").ok();
        let db_max_connections: u32 = parse_var("DB_MAX_CONNECTIONS", "20");
        let task_max_retries: u32 =
            parse_var("TASK_MAX_RETRIES", &DEFAULT_MAX_RETRIES.to_string());
        let task_lease_secs: u64 = parse_var("TASK_LEASE_SECS", "0");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            store_backend,
            database_url,
            db_max_connections,
            task_max_retries,
            task_lease_secs,
        }
    }

    /// Server-wide queue defaults; projects may override them.
    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy::from_limits(self.task_max_retries, self.task_lease_secs)
    }
}

/// Read and parse `name`, falling back to `default`. Panics on a value that
/// does not parse; misconfiguration should stop startup.
fn parse_var<T>(name: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .unwrap_or_else(|e| panic!("{name} has invalid value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn store_backend_parses_case_insensitively() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn queue_policy_treats_zero_as_disabled() {
        let mut config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec![],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 30,
            store_backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 20,
            task_max_retries: 0,
            task_lease_secs: 0,
        };
        assert_eq!(config.queue_policy(), QueuePolicy::from_limits(0, 0));

        config.task_max_retries = 5;
        config.task_lease_secs = 90;
        let policy = config.queue_policy();
        assert_eq!(policy.max_retries, Some(5));
        assert_eq!(policy.lease, Some(Duration::from_secs(90)));
    }
}
