use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent_client::{AgentInvoker, FixtureAgentClient, GatewayAgentClient};
use crate::session::AgentTarget;

const DEFAULT_ALIAS_ID: &str = "TSTALIASID";
const DEFAULT_TITLE: &str = "Welcome to Accura Agent";
const DEFAULT_REGION: &str = "ap-southeast-2";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentBackend {
    /// Replay a recorded completion from disk
    Fixture(PathBuf),
    /// Relay invocations through an HTTP gateway
    Gateway(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the console listens on
    pub port: u16,
    /// Agent id; the gateway refuses to invoke without one
    pub agent_id: Option<String>,
    pub agent_alias_id: String,
    /// Page header title
    pub ui_title: String,
    /// Page header icon
    pub ui_icon: Option<String>,
    pub region: String,
    pub backend: AgentBackend,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = match (
            env_opt("AGENT_FIXTURE_PATH"),
            env_opt("AGENT_GATEWAY_URL"),
        ) {
            (Some(path), _) => AgentBackend::Fixture(PathBuf::from(path)),
            (None, Some(url)) => AgentBackend::Gateway(url),
            (None, None) => {
                return Err(anyhow::anyhow!(
                    "No agent backend configured. Set AGENT_GATEWAY_URL or AGENT_FIXTURE_PATH"
                ))
            }
        };

        Ok(Self {
            port: env_parse("CONSOLE_PORT", 8080)?,
            agent_id: env_opt("BEDROCK_AGENT_ID"),
            agent_alias_id: env_str("BEDROCK_AGENT_ALIAS_ID", DEFAULT_ALIAS_ID),
            ui_title: env_str("BEDROCK_AGENT_TEST_UI_TITLE", DEFAULT_TITLE),
            ui_icon: env_opt("BEDROCK_AGENT_TEST_UI_ICON"),
            region: env_str("AWS_DEFAULT_REGION", DEFAULT_REGION),
            backend,
        })
    }

    pub fn target(&self) -> AgentTarget {
        AgentTarget {
            agent_id: self.agent_id.clone(),
            agent_alias_id: self.agent_alias_id.clone(),
        }
    }

    pub fn build_invoker(&self) -> Arc<dyn AgentInvoker> {
        match &self.backend {
            AgentBackend::Fixture(path) => Arc::new(FixtureAgentClient::new(path)),
            AgentBackend::Gateway(url) => {
                Arc::new(GatewayAgentClient::new(url.clone(), self.region.clone()))
            }
        }
    }
}

/// Default filter directive: `RUST_LOG` wins, then `LOG_LEVEL`, then info.
pub fn default_log_filter(crate_name: &str) -> String {
    let level = std::env::var("LOG_LEVEL")
        .map(|level| level.to_lowercase())
        .unwrap_or_else(|_| "info".to_string());
    format!("{crate_name}={level},tower_http=info")
}

/// Result of the `.env` lookup, logged once the subscriber is installed
#[derive(Debug)]
pub enum EnvFile {
    Loaded(PathBuf),
    Failed {
        path: PathBuf,
        error: dotenvy::Error,
    },
    NotFound(PathBuf),
    NoCurrentDir(std::io::Error),
}

impl EnvFile {
    pub fn log(&self) {
        match self {
            EnvFile::Loaded(path) => {
                tracing::info!(path = %path.display(), "Loaded environment from .env")
            }
            EnvFile::Failed { path, error } => tracing::warn!(
                path = %path.display(),
                error = %error,
                "Failed to load .env file"
            ),
            EnvFile::NotFound(cwd) => tracing::info!(
                cwd = %cwd.display(),
                "No .env file found in current directory or ancestors; using process environment only"
            ),
            EnvFile::NoCurrentDir(e) => tracing::warn!(
                error = %e,
                "Could not determine current directory for .env lookup"
            ),
        }
    }
}

/// Load the nearest `.env` in the current directory or its ancestors.
pub fn load_env_file() -> EnvFile {
    match std::env::current_dir() {
        Ok(cwd) => load_env_file_from(&cwd),
        Err(e) => EnvFile::NoCurrentDir(e),
    }
}

pub fn load_env_file_from(start: &Path) -> EnvFile {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            return match dotenvy::from_path(&candidate) {
                Ok(()) => EnvFile::Loaded(candidate),
                Err(error) => EnvFile::Failed {
                    path: candidate,
                    error,
                },
            };
        }

        if !current.pop() {
            return EnvFile::NotFound(start.to_path_buf());
        }
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
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
