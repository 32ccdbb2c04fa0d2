use std::env;

use crate::config::ConfigError;

pub(crate) fn require_env(key: &str) -> Result<String, ConfigError> {
    optional_trimmed_env(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

pub(crate) fn parse_u32_env(key: &str, default: u32) -> Result<u32, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

pub(crate) fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

pub(crate) fn parse_usize_env(key: &str, default: usize) -> Result<usize, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

pub(crate) fn parse_f32_env(key: &str, default: f32) -> Result<f32, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => match raw.parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(ConfigError::ParseFloat(key.to_string())),
        },
        None => Ok(default),
    }
}

pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_trimmed_env(key) {
        Some(raw) => {
            let normalized = raw.to_ascii_lowercase();
            match normalized.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::ParseBool(key.to_string())),
            }
        }
        None => Ok(default),
    }
}

pub(crate) fn require_http_url(key: &str, value: String) -> Result<String, ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value)
    } else {
        Err(ConfigError::InvalidConfiguration(format!(
            "{key} must start with http:// or https://"
        )))
    }
}

pub(crate) fn optional_trimmed_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
