use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Orchestrator limits, budgets, poll interval and index bound are non-zero
/// - Stage timeout is non-zero and configured stage URLs parse
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.max_concurrent_partials == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_concurrent_partials cannot be 0".to_string(),
        ));
    }
    if orchestrator.finalize_budget_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.finalize_budget_ms cannot be 0".to_string(),
        ));
    }
    if orchestrator.readiness_poll_ms == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.readiness_poll_ms cannot be 0".to_string(),
        ));
    }

    if orchestrator.max_last_index == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.max_last_index cannot be 0".to_string(),
        ));
    }

    if config.stages.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "stages.timeout_secs cannot be 0".to_string(),
        ));
    }
    for (key, url) in [
        ("stages.partial_url", &config.stages.partial_url),
        ("stages.finalize_url", &config.stages.finalize_url),
    ] {
        if let Some(url) = url {
            reqwest::Url::parse(url).map_err(|e| {
                ConfigError::ValidationError(format!("{} is not a valid URL: {}", key, e))
            })?;
        }
    }

    Ok(())
}
