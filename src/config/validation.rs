use crate::config::types::{Config, CrawlerConfig, ExtractionConfig, HttpConfig};
use crate::ConfigError;

/// Upper bound on the worker pool size
pub const MAX_THREADS: usize = 256;

/// Upper bound on redirect hops per page
pub const MAX_REDIRECTS: u32 = 20;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_extraction_config(&config.extraction)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.threads < 1 || config.threads > MAX_THREADS {
        return Err(ConfigError::Validation(format!(
            "threads must be between 1 and {}, got {}",
            MAX_THREADS, config.threads
        )));
    }

    if config.max_links < 1 {
        return Err(ConfigError::Validation(
            "max_links must be >= 1, got 0".to_string(),
        ));
    }

    if config.max_redirects > MAX_REDIRECTS {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= {}, got {}",
            MAX_REDIRECTS, config.max_redirects
        )));
    }

    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeouts must be >= 1s, got timeout={}s connect={}s",
            config.timeout_secs, config.connect_timeout_secs
        )));
    }

    Ok(())
}

fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    for ext in config
        .allowed_extensions
        .iter()
        .chain(config.rejected_extensions.iter())
    {
        validate_extension(ext)?;
    }

    if let Some(both) = config
        .allowed_extensions
        .iter()
        .find(|ext| config.rejected_extensions.contains(ext))
    {
        return Err(ConfigError::Validation(format!(
            "extension '{}' is both allowed and rejected",
            both
        )));
    }

    Ok(())
}

/// Extensions are compared against lowercased URL suffixes, so they must be
/// stored lowercase and without the leading dot.
fn validate_extension(ext: &str) -> Result<(), ConfigError> {
    if ext.is_empty() {
        return Err(ConfigError::Validation(
            "extension cannot be empty".to_string(),
        ));
    }

    if ext.starts_with('.') {
        return Err(ConfigError::Validation(format!(
            "extension '{}' must not start with '.'",
            ext
        )));
    }

    if !ext
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(ConfigError::Validation(format!(
            "extension '{}' must be lowercase alphanumeric",
            ext
        )));
    }

    Ok(())
}
