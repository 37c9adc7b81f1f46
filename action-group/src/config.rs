#[derive(Debug, Clone)]
pub struct Config {
    /// Port the action endpoint listens on
    pub port: u16,
    /// Table scanned for transactions
    pub table: String,
    /// SQLite URL of the table store; unset means an empty in-memory store
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            port: env_parse("ACTION_GROUP_PORT", 8090)?,
            table: env_str("TRANSACTIONS_TABLE", "transactions"),
            database_url: std::env::var("ACTION_GROUP_DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}

/// Default filter directive: `RUST_LOG` wins, then `LOG_LEVEL`, then info.
pub fn default_log_filter() -> String {
    let level = std::env::var("LOG_LEVEL")
        .map(|level| level.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());
    format!("action_group={level},tower_http=info")
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}
