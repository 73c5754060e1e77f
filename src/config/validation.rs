use crate::config::types::{Config, EngineConfig, FetcherConfig, RateLimitConfig, SourceEntry};
use crate::registry::FetchStrategy;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_engine_config(&config.engine)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_storage(config)?;
    validate_sources(&config.sources)?;
    validate_render_requirement(config)?;
    Ok(())
}

fn validate_engine_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.failure_threshold < 1 {
        return Err(ConfigError::Validation(format!(
            "failure_threshold must be >= 1, got {}",
            config.failure_threshold
        )));
    }

    if config.http_concurrency < 1 || config.http_concurrency > 32 {
        return Err(ConfigError::Validation(format!(
            "http_concurrency must be between 1 and 32, got {}",
            config.http_concurrency
        )));
    }

    if config.rendered_concurrency < 1 || config.rendered_concurrency > 8 {
        return Err(ConfigError::Validation(format!(
            "rendered_concurrency must be between 1 and 8, got {}",
            config.rendered_concurrency
        )));
    }

    if config.jitter_pct > 50 {
        return Err(ConfigError::Validation(format!(
            "jitter_pct must be <= 50, got {}",
            config.jitter_pct
        )));
    }

    if config.drift_min_ratio <= 0.0
        || config.drift_max_ratio <= config.drift_min_ratio
    {
        return Err(ConfigError::Validation(format!(
            "drift ratios must satisfy 0 < min < max, got {} / {}",
            config.drift_min_ratio, config.drift_max_ratio
        )));
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_redirects > 10 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 10, got {}",
            config.max_redirects
        )));
    }

    if config.retry_base_secs < 1 || config.retry_cap_secs < config.retry_base_secs {
        return Err(ConfigError::Validation(format!(
            "retry backoff must satisfy 1 <= base <= cap, got {} / {}",
            config.retry_base_secs, config.retry_cap_secs
        )));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    for (name, secs) in [
        ("default-secs", config.default_secs),
        ("gentle-secs", config.gentle_secs),
        ("strict-secs", config.strict_secs),
    ] {
        if secs < 1 {
            return Err(ConfigError::Validation(format!(
                "rate-limit {} must be >= 1 second, got {}",
                name, secs
            )));
        }
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ConfigError> {
    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in sources {
        if entry.id.is_empty() {
            return Err(ConfigError::Validation(
                "source id cannot be empty".to_string(),
            ));
        }

        if !entry
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "source id must contain only alphanumerics, hyphens, and underscores, got '{}'",
                entry.id
            )));
        }

        if !seen.insert(entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                entry.id
            )));
        }

        let parsed = Url::parse(&entry.origin_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", entry.id, e)))?;
        if parsed.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: origin-url has no host",
                entry.id
            )));
        }

        if entry.refresh_interval_hours < 1 {
            return Err(ConfigError::Validation(format!(
                "source '{}': refresh-interval-hours must be >= 1",
                entry.id
            )));
        }
    }

    Ok(())
}

fn validate_render_requirement(config: &Config) -> Result<(), ConfigError> {
    let needs_render = config
        .sources
        .iter()
        .any(|s| s.fetch_strategy == FetchStrategy::Rendered);

    if needs_render && config.render.is_none() {
        return Err(ConfigError::Validation(
            "catalog contains rendered sources but no [render] section is configured".to_string(),
        ));
    }

    Ok(())
}
