use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::orchestrator::OrchestratorConfig;
use crate::stage::StagesConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Sanitized config for API responses (stage URLs reduced to their host)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub orchestrator: OrchestratorConfig,
    pub stages: SanitizedStagesConfig,
    pub logging: LoggingConfig,
}

/// Sanitized stage config (paths and credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStagesConfig {
    pub partial_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_host: Option<String>,
    pub finalize_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize_host: Option<String>,
    pub timeout_secs: u64,
}

fn url_host(url: &Option<String>) -> Option<String> {
    url.as_deref()
        .and_then(|u| reqwest::Url::parse(u).ok())
        .and_then(|u| u.host_str().map(str::to_string))
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            orchestrator: config.orchestrator.clone(),
            stages: SanitizedStagesConfig {
                partial_configured: config.stages.partial_url.is_some(),
                partial_host: url_host(&config.stages.partial_url),
                finalize_configured: config.stages.finalize_url.is_some(),
                finalize_host: url_host(&config.stages.finalize_url),
                timeout_secs: config.stages.timeout_secs,
            },
            logging: config.logging.clone(),
        }
    }
}
