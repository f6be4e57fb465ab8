//! Batch configuration, loaded from TOML.
//!
//! String values of the exact form `${VAR}` are replaced with the
//! environment variable's value before deserialization. Ranges are checked
//! once, in `RunnerConfig::from_toml`; everything downstream trusts them.

use barsmith_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::alerts::AlertLevel;

/// Full configuration for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Processing engine settings shared by every symbol.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Symbols to collect and process.
    pub symbols: Vec<String>,

    /// Worker threads for per-symbol processing.
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: usize,

    /// How far back from the end date to request bars.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    pub provider: ProviderConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

fn default_parallel_jobs() -> usize {
    1
}

fn default_lookback_days() -> u32 {
    365
}

/// Where raw rows come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderConfig {
    /// One `{symbol}.csv` per symbol in a directory.
    Csv { dir: PathBuf },

    /// Yahoo Finance chart API.
    Yahoo(YahooConfig),

    /// Alpha Vantage `TIME_SERIES_DAILY`.
    AlphaVantage(AlphaVantageConfig),
}

/// Request budget and retry settings for the Yahoo provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    /// Requests allowed per window.
    pub calls: usize,
    /// Window length in seconds.
    pub period_secs: u64,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            calls: 100,
            period_secs: 60,
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

/// Key and request budget for the Alpha Vantage provider.
///
/// The key is usually given as `"${ALPHA_VANTAGE_API_KEY}"`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaVantageConfig {
    pub api_key: String,
    /// Requests allowed per window.
    #[serde(default = "default_av_calls")]
    pub calls: usize,
    /// Window length in seconds.
    #[serde(default = "default_av_period_secs")]
    pub period_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_av_calls() -> usize {
    500
}

fn default_av_period_secs() -> u64 {
    86_400
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

impl AlphaVantageConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            calls: default_av_calls(),
            period_secs: default_av_period_secs(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

impl fmt::Debug for AlphaVantageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantageConfig")
            .field("api_key", &"<redacted>")
            .field("calls", &self.calls)
            .field("period_secs", &self.period_secs)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

/// Where processed series go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageConfig {
    /// `{dir}/symbol={SYMBOL}/bars.parquet` plus a metadata sidecar.
    Parquet { dir: PathBuf },

    /// `{dir}/{SYMBOL}.csv`.
    Csv { dir: PathBuf },

    /// Process only; nothing is written.
    #[default]
    None,
}

/// Operation SLAs and the alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Maximum seconds per operation name (`fetch`, `process`, `store`).
    /// Operations without an entry are never flagged as slow.
    pub sla_secs: BTreeMap<String, u64>,

    /// Alerts below this level are dropped.
    pub alert_level: AlertLevel,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        let sla_secs = [("fetch", 60), ("process", 30), ("store", 30)]
            .into_iter()
            .map(|(op, secs)| (op.to_string(), secs))
            .collect();
        Self {
            sla_secs,
            alert_level: AlertLevel::Warning,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    MissingEnvVar(String),

    #[error("{field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },

    #[error("pipeline config: {0}")]
    Pipeline(#[from] barsmith_core::config::ConfigError),
}

impl RunnerConfig {
    /// Read, resolve and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text, resolving `${VAR}` from the process environment.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Self::from_toml_with_env(text, |name| std::env::var(name).ok())
    }

    /// Parse TOML text with a caller-supplied variable lookup.
    pub fn from_toml_with_env(
        text: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw: toml::Value = toml::from_str(text)?;
        let resolved = resolve_env_vars(raw, &lookup)?;
        let config: RunnerConfig = resolved.try_into()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;

        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid {
                field: "symbols",
                reason: "at least one symbol is required".into(),
            });
        }
        if let Some(blank) = self.symbols.iter().position(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "symbols",
                reason: format!("entry {blank} is blank"),
            });
        }
        if self.parallel_jobs == 0 {
            return Err(ConfigError::Invalid {
                field: "parallel_jobs",
                reason: "must be greater than 0".into(),
            });
        }
        if self.lookback_days == 0 {
            return Err(ConfigError::Invalid {
                field: "lookback_days",
                reason: "must be greater than 0".into(),
            });
        }
        match &self.provider {
            ProviderConfig::Csv { .. } => {}
            ProviderConfig::Yahoo(yahoo) => {
                check_request_budget(yahoo.calls, yahoo.period_secs, yahoo.timeout_secs)?
            }
            ProviderConfig::AlphaVantage(av) => {
                if av.api_key.trim().is_empty() {
                    return Err(ConfigError::Invalid {
                        field: "provider.api_key",
                        reason: "must not be blank".into(),
                    });
                }
                check_request_budget(av.calls, av.period_secs, av.timeout_secs)?
            }
        }
        Ok(())
    }
}

fn check_request_budget(
    calls: usize,
    period_secs: u64,
    timeout_secs: u64,
) -> Result<(), ConfigError> {
    if calls == 0 || period_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "provider",
            reason: "rate limit needs calls > 0 and period_secs > 0".into(),
        });
    }
    if timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "provider.timeout_secs",
            reason: "must be greater than 0".into(),
        });
    }
    Ok(())
}

/// Replace every string of the form `${NAME}` with `lookup(NAME)`.
fn resolve_env_vars(
    value: toml::Value,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<toml::Value, ConfigError> {
    use toml::Value;
    Ok(match value {
        Value::String(s) => match s.strip_prefix("${").and_then(|r| r.strip_suffix('}')) {
            Some(name) => Value::String(
                lookup(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))?,
            ),
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| resolve_env_vars(v, lookup))
                .collect::<Result<_, _>>()?,
        ),
        Value::Table(table) => Value::Table(
            table
                .into_iter()
                .map(|(k, v)| Ok((k, resolve_env_vars(v, lookup)?)))
                .collect::<Result<_, ConfigError>>()?,
        ),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        symbols = ["SPY", "QQQ"]

        [provider]
        type = "CSV"
        dir = "data/raw"
    "#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = RunnerConfig::from_toml_with_env(MINIMAL, no_env).unwrap();
        assert_eq!(config.symbols, vec!["SPY", "QQQ"]);
        assert_eq!(config.parallel_jobs, 1);
        assert_eq!(config.lookback_days, 365);
        assert_eq!(config.storage, StorageConfig::None);
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.monitoring.sla_secs.get("fetch"), Some(&60));
        assert_eq!(
            config.provider,
            ProviderConfig::Csv {
                dir: PathBuf::from("data/raw")
            }
        );
    }

    #[test]
    fn full_config_parses() {
        let text = r#"
            symbols = ["AAPL"]
            parallel_jobs = 4
            lookback_days = 30

            [pipeline.validation]
            price_policy = "STRICT"

            [pipeline.quality]
            zscore_threshold = 4.0

            [provider]
            type = "YAHOO"
            calls = 5
            period_secs = 1

            [storage]
            type = "PARQUET"
            dir = "out"

            [monitoring]
            alert_level = "CRITICAL"
            sla_secs = { fetch = 10 }
        "#;
        let config = RunnerConfig::from_toml_with_env(text, no_env).unwrap();
        assert_eq!(config.parallel_jobs, 4);
        assert_eq!(
            config.pipeline.validation.price_policy,
            barsmith_core::PricePolicy::Strict
        );
        assert_eq!(config.pipeline.quality.zscore_threshold, 4.0);
        let ProviderConfig::Yahoo(yahoo) = &config.provider else {
            panic!("expected yahoo provider");
        };
        assert_eq!(yahoo.calls, 5);
        assert_eq!(yahoo.retry_attempts, 3);
        assert_eq!(config.monitoring.alert_level, AlertLevel::Critical);
        assert_eq!(config.monitoring.sla_secs.len(), 1);
    }

    #[test]
    fn env_vars_are_resolved() {
        let text = r#"
            symbols = ["${TICKER}", "QQQ"]

            [provider]
            type = "CSV"
            dir = "${DATA_DIR}"
        "#;
        let config = RunnerConfig::from_toml_with_env(text, |name| match name {
            "TICKER" => Some("SPY".into()),
            "DATA_DIR" => Some("/srv/bars".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.symbols, vec!["SPY", "QQQ"]);
        assert_eq!(
            config.provider,
            ProviderConfig::Csv {
                dir: PathBuf::from("/srv/bars")
            }
        );
    }

    #[test]
    fn missing_env_var_is_an_error() {
        let text = r#"
            symbols = ["SPY"]
            [provider]
            type = "CSV"
            dir = "${NOT_SET_ANYWHERE}"
        "#;
        let err = RunnerConfig::from_toml_with_env(text, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "NOT_SET_ANYWHERE"));
    }

    #[test]
    fn partial_placeholders_are_left_alone() {
        let text = r#"
            symbols = ["prefix-${X}"]
            [provider]
            type = "CSV"
            dir = "d"
        "#;
        let config = RunnerConfig::from_toml_with_env(text, no_env).unwrap();
        assert_eq!(config.symbols, vec!["prefix-${X}"]);
    }

    #[test]
    fn rejects_zero_parallel_jobs() {
        let text = format!("parallel_jobs = 0\n{MINIMAL}");
        let err = RunnerConfig::from_toml_with_env(&text, no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "parallel_jobs",
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_symbols() {
        let text = r#"
            symbols = []
            [provider]
            type = "CSV"
            dir = "d"
        "#;
        assert!(RunnerConfig::from_toml_with_env(text, no_env).is_err());
    }

    #[test]
    fn pipeline_ranges_are_checked() {
        let text = format!("{MINIMAL}\n[pipeline.quality]\nmax_missing_ratio = 2.0\n");
        let err = RunnerConfig::from_toml_with_env(&text, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Pipeline(_)));
    }

    #[test]
    fn zero_rate_limit_rejected() {
        let text = r#"
            symbols = ["SPY"]
            [provider]
            type = "YAHOO"
            calls = 0
        "#;
        assert!(RunnerConfig::from_toml_with_env(text, no_env).is_err());
    }

    #[test]
    fn alpha_vantage_key_comes_from_env() {
        let text = r#"
            symbols = ["IBM"]
            [provider]
            type = "ALPHA_VANTAGE"
            api_key = "${ALPHA_VANTAGE_API_KEY}"
            calls = 5
            period_secs = 60
        "#;
        let config = RunnerConfig::from_toml_with_env(text, |name| {
            (name == "ALPHA_VANTAGE_API_KEY").then(|| "secret-key".to_string())
        })
        .unwrap();
        let ProviderConfig::AlphaVantage(av) = &config.provider else {
            panic!("expected alpha vantage provider");
        };
        assert_eq!(av.api_key, "secret-key");
        assert_eq!(av.calls, 5);
        assert_eq!(av.timeout_secs, 30);
        assert_eq!(av.retry_attempts, 3);
        assert!(!format!("{config:?}").contains("secret-key"));

        let err = RunnerConfig::from_toml_with_env(text, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "ALPHA_VANTAGE_API_KEY"));
    }

    #[test]
    fn alpha_vantage_defaults_and_blank_key() {
        let text = r#"
            symbols = ["IBM"]
            [provider]
            type = "ALPHA_VANTAGE"
            api_key = "k"
        "#;
        let config = RunnerConfig::from_toml_with_env(text, no_env).unwrap();
        assert_eq!(
            config.provider,
            ProviderConfig::AlphaVantage(AlphaVantageConfig::new("k"))
        );

        let blank = text.replace("\"k\"", "\"  \"");
        let err = RunnerConfig::from_toml_with_env(&blank, no_env).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "provider.api_key",
                ..
            }
        ));
    }

    #[test]
    fn unreadable_file_is_io_error() {
        let err = RunnerConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
