use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;

/// Validator for configuration settings
pub trait Validator {
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.collectors.validate()?;
        self.apiserver.validate()?;
        self.watcher.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

impl Validator for ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingRequired("server.host".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::invalid_value(
                "server.port",
                format!("port must be between 1 and 65535, got {}", self.port),
            ));
        }

        Ok(())
    }
}

impl Validator for CollectorsConfig {
    fn validate(&self) -> ConfigResult<()> {
        // Unknown names are tolerated here; only blanks are rejected
        if self.enabled.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "collectors.enabled",
                "collector names must not be empty",
            ));
        }

        if self.namespaces.iter().any(|ns| ns.trim().is_empty()) {
            return Err(ConfigError::invalid_value(
                "collectors.namespaces",
                "namespace names must not be empty",
            ));
        }

        Ok(())
    }
}

impl Validator for ApiServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.url.is_empty() {
            return Err(ConfigError::MissingRequired("apiserver.url".to_string()));
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::invalid_value(
                "apiserver.url",
                format!("must start with http:// or https://, got {}", self.url),
            ));
        }

        if let Some(token_file) = &self.token_file {
            if !token_file.exists() {
                return Err(ConfigError::FileNotFound(token_file.clone()));
            }
        }

        Ok(())
    }
}

impl Validator for WatcherSettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.resync_period_secs == 0 {
            return Err(ConfigError::invalid_value(
                "watcher.resync_period_secs",
                "must be greater than 0",
            ));
        }

        if self.backoff_base_ms == 0 {
            return Err(ConfigError::invalid_value(
                "watcher.backoff_base_ms",
                "must be greater than 0",
            ));
        }

        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::invalid_value(
                "watcher.backoff_max_ms",
                format!(
                    "must be at least backoff_base_ms ({})",
                    self.backoff_base_ms
                ),
            ));
        }

        Ok(())
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}
