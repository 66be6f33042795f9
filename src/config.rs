use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::external::history_provider::clamp_source_timeout;
use crate::services::generation_service::GenerationConfig;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub history_lookback_days: u32,
    pub primary_timeout: Duration,
    pub index_timeout: Duration,
    pub secondary_timeout: Duration,
    pub tertiary_timeout: Duration,
    pub quote_timeout: Duration,
    pub generation: GenerationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            history_lookback_days: 90,
            primary_timeout: Duration::from_secs(10),
            index_timeout: Duration::from_secs(5),
            secondary_timeout: Duration::from_secs(3),
            tertiary_timeout: Duration::from_secs(3),
            quote_timeout: Duration::from_secs(10),
            generation: GenerationConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value lookup. Invalid numbers keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let source_timeout = |key: &str, default: Duration| {
            clamp_source_timeout(Duration::from_secs(parse_or(&lookup, key, default.as_secs())))
        };

        Self {
            port: parse_or(&lookup, "PORT", defaults.port),
            history_lookback_days: parse_or(&lookup, "HISTORY_LOOKBACK_DAYS", defaults.history_lookback_days),
            primary_timeout: source_timeout("PRIMARY_TIMEOUT_SECS", defaults.primary_timeout),
            index_timeout: source_timeout("INDEX_TIMEOUT_SECS", defaults.index_timeout),
            secondary_timeout: source_timeout("SECONDARY_TIMEOUT_SECS", defaults.secondary_timeout),
            tertiary_timeout: source_timeout("TERTIARY_TIMEOUT_SECS", defaults.tertiary_timeout),
            quote_timeout: source_timeout("QUOTE_TIMEOUT_SECS", defaults.quote_timeout),
            generation: GenerationConfig {
                api_key: lookup("PPLX_API_KEY").filter(|key| !key.trim().is_empty()),
                model: lookup("GENERATION_MODEL").unwrap_or(defaults.generation.model),
                temperature: parse_or(&lookup, "GENERATION_TEMPERATURE", defaults.generation.temperature),
                timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "GENERATION_TIMEOUT_SECS",
                    defaults.generation.timeout.as_secs(),
                )),
                ..defaults.generation
            },
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value {:?} for {}; using default", raw, key);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = config_from(&[]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.history_lookback_days, 90);
        assert_eq!(config.primary_timeout, Duration::from_secs(10));
        assert_eq!(config.secondary_timeout, Duration::from_secs(3));
        assert!(config.generation.api_key.is_none());
        assert_eq!(config.generation.model, "sonar-pro");
    }

    #[test]
    fn test_values_are_read() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("HISTORY_LOOKBACK_DAYS", "120"),
            ("PPLX_API_KEY", "pplx-123"),
            ("GENERATION_TEMPERATURE", "0.5"),
        ]);

        assert_eq!(config.port, 9000);
        assert_eq!(config.history_lookback_days, 120);
        assert_eq!(config.generation.api_key.as_deref(), Some("pplx-123"));
        assert_eq!(config.generation.temperature, 0.5);
    }

    #[test]
    fn test_source_timeouts_are_clamped() {
        let config = config_from(&[("PRIMARY_TIMEOUT_SECS", "60"), ("SECONDARY_TIMEOUT_SECS", "1")]);

        assert_eq!(config.primary_timeout, Duration::from_secs(10));
        assert_eq!(config.secondary_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "eighty"), ("INDEX_TIMEOUT_SECS", "-4")]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.index_timeout, Duration::from_secs(5));
    }
}
