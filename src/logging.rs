use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("LOKI_ENABLED is true but LOKI_URL is not set")]
    MissingLokiUrl,

    #[error("invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("invalid LOKI_URL: {0}")]
    LokiUrl(#[from] url::ParseError),

    #[cfg(feature = "loki")]
    #[error("failed to build Loki layer: {0}")]
    Loki(#[from] tracing_loki::Error),

    #[error("global subscriber already installed: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub loki_enabled: bool,
    pub loki_url: Option<String>,
    pub service_name: String,
    pub environment: String,
    pub log_level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            loki_enabled: lookup("LOKI_ENABLED")
                .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1"))
                .unwrap_or(false),
            loki_url: lookup("LOKI_URL").filter(|url| !url.trim().is_empty()),
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Loki endpoint to ship to, or `None` for console only.
    pub fn loki_target(&self) -> Result<Option<url::Url>, LoggingError> {
        if !self.loki_enabled {
            return Ok(None);
        }
        let raw = self.loki_url.as_deref().ok_or(LoggingError::MissingLokiUrl)?;
        Ok(Some(url::Url::parse(raw)?))
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        EnvFilter::try_new(&self.log_level).map_err(|source| LoggingError::Filter {
            filter: self.log_level.clone(),
            source,
        })
    }
}

/// Install the global subscriber: console always, plus Loki when enabled
/// and compiled in. Must run inside the tokio runtime.
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    let loki_target = config.loki_target()?;
    let registry = tracing_subscriber::registry()
        .with(config.filter()?)
        .with(tracing_subscriber::fmt::layer());

    #[cfg(feature = "loki")]
    let registry = registry.with(match &loki_target {
        Some(url) => Some(loki_layer(&config, url.clone())?),
        None => None,
    });

    registry.try_init()?;

    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        "📊 Logging initialized (loki: {})",
        loki_target.as_ref().map_or("off", url::Url::as_str)
    );
    if loki_target.is_some() && !cfg!(feature = "loki") {
        tracing::warn!("LOKI_ENABLED is set but this build has no Loki support; logging to console only");
    }
    Ok(())
}

#[cfg(feature = "loki")]
fn loki_layer(config: &LoggingConfig, url: url::Url) -> Result<tracing_loki::Layer, LoggingError> {
    let (layer, task) = tracing_loki::builder()
        .label("service", &config.service_name)?
        .label("environment", &config.environment)?
        .label("version", env!("CARGO_PKG_VERSION"))?
        .build_url(url)?;

    tokio::spawn(task);
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> LoggingConfig {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        LoggingConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert!(!config.loki_enabled);
        assert_eq!(config.service_name, "nukida-backend");
        assert_eq!(config.log_level, "info");
        assert!(matches!(config.loki_target(), Ok(None)));
    }

    #[test]
    fn test_loki_requires_url() {
        let config = config_from(&[("LOKI_ENABLED", "true")]);
        assert!(matches!(config.loki_target(), Err(LoggingError::MissingLokiUrl)));

        let config = config_from(&[("LOKI_ENABLED", "1"), ("LOKI_URL", "not a url")]);
        assert!(matches!(config.loki_target(), Err(LoggingError::LokiUrl(_))));

        let config = config_from(&[("LOKI_ENABLED", "TRUE"), ("LOKI_URL", "http://localhost:3100")]);
        let url = config.loki_target().unwrap().unwrap();
        assert_eq!(url.port(), Some(3100));
    }

    #[test]
    fn test_url_ignored_when_disabled() {
        let config = config_from(&[("LOKI_ENABLED", "no"), ("LOKI_URL", "http://localhost:3100")]);
        assert!(matches!(config.loki_target(), Ok(None)));
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let config = config_from(&[("RUST_LOG", "nukida_backend=loud")]);
        assert!(matches!(config.filter(), Err(LoggingError::Filter { .. })));
        assert!(config_from(&[("RUST_LOG", "nukida_backend=debug,tower_http=warn")]).filter().is_ok());
    }
}
