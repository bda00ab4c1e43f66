use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, ParserConfig, RateLimitConfig, RetryConfig, SiteConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    validate_parser_config(&config.parser)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    if config.request_timeout < 100 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 100ms, got {}ms",
            config.request_timeout
        )));
    }

    Ok(())
}

/// Validates token bucket configuration
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "rate-limit capacity must be >= 1, got {}",
            config.capacity
        )));
    }

    if config.refill_interval < 1 {
        return Err(ConfigError::Validation(
            "refill_interval must be >= 1ms".to_string(),
        ));
    }

    // Spin-wait granularity of the limiter
    if config.poll_interval < 1 || config.poll_interval >= config.refill_interval {
        return Err(ConfigError::Validation(format!(
            "poll_interval must be >= 1ms and below refill_interval ({}ms), got {}ms",
            config.refill_interval, config.poll_interval
        )));
    }

    Ok(())
}

/// Validates the 429 retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_rate_limit_retries < 1 {
        return Err(ConfigError::Validation(format!(
            "max_rate_limit_retries must be >= 1, got {}",
            config.max_rate_limit_retries
        )));
    }

    if config.backoff_min > config.backoff_max {
        return Err(ConfigError::Validation(format!(
            "backoff_min ({}ms) must not exceed backoff_max ({}ms)",
            config.backoff_min, config.backoff_max
        )));
    }

    if config.backoff_cap < config.backoff_max {
        return Err(ConfigError::Validation(format!(
            "backoff_cap ({}ms) must be >= backoff_max ({}ms)",
            config.backoff_cap, config.backoff_max
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the target site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if !config.comments_path.contains("{post_id}") {
        return Err(ConfigError::Validation(format!(
            "comments_path must contain the {{post_id}} placeholder, got '{}'",
            config.comments_path
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("seeds_path", &config.seeds_path),
        ("checkpoint_dir", &config.checkpoint_dir),
        ("results_dir", &config.results_dir),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates that every parser selector compiles
fn validate_parser_config(config: &ParserConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.post_selector,
        &config.post_body_selector,
        &config.comment_selector,
        &config.comment_text_selector,
        &config.more_replies_selector,
        &config.action_row_selector,
    ] {
        Selector::parse(selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;
    }

    if config.comment_id_attr.is_empty() {
        return Err(ConfigError::Validation(
            "comment_id_attr cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
