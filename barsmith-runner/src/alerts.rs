//! Alert routing.
//!
//! Quality findings become `Warning` alerts, failed symbols `Critical`, and
//! the end-of-batch summary `Info`. Sinks drop anything below their
//! threshold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Alert severity, ordered `Info < Warning < Critical`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Info,
    #[default]
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub symbol: Option<String>,
    pub message: String,
    pub details: Vec<String>,
}

impl Alert {
    pub fn new(level: AlertLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            symbol: None,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn for_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

pub trait AlertSink: Send + Sync {
    fn send(&self, alert: Alert);
}

/// Emits alerts as log events at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink {
    threshold: AlertLevel,
}

impl TracingAlertSink {
    pub fn new(threshold: AlertLevel) -> Self {
        Self { threshold }
    }
}

impl AlertSink for TracingAlertSink {
    fn send(&self, alert: Alert) {
        if alert.level < self.threshold {
            return;
        }
        let symbol = alert.symbol.as_deref().unwrap_or("-");
        let details = alert.details.join("; ");
        match alert.level {
            AlertLevel::Critical => error!(symbol, details = %details, "{}", alert.message),
            AlertLevel::Warning => warn!(symbol, details = %details, "{}", alert.message),
            AlertLevel::Info => info!(symbol, details = %details, "{}", alert.message),
        }
    }
}

/// Keeps alerts in memory.
#[derive(Debug)]
pub struct MemoryAlertSink {
    threshold: AlertLevel,
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    /// Records every alert, `Info` included.
    pub fn new() -> Self {
        Self::with_threshold(AlertLevel::Info)
    }

    pub fn with_threshold(threshold: AlertLevel) -> Self {
        Self {
            threshold,
            alerts: Mutex::new(Vec::new()),
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self, level: AlertLevel) -> usize {
        self.alerts().iter().filter(|a| a.level == level).count()
    }
}

impl Default for MemoryAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for MemoryAlertSink {
    fn send(&self, alert: Alert) {
        if alert.level < self.threshold {
            return;
        }
        self.alerts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(AlertLevel::Info < AlertLevel::Warning);
        assert!(AlertLevel::Warning < AlertLevel::Critical);
        assert_eq!(AlertLevel::default(), AlertLevel::Warning);
    }

    #[test]
    fn memory_sink_applies_threshold() {
        let sink = MemoryAlertSink::with_threshold(AlertLevel::Warning);
        sink.send(Alert::new(AlertLevel::Info, "batch finished"));
        sink.send(Alert::new(AlertLevel::Warning, "quality").for_symbol("SPY"));
        sink.send(
            Alert::new(AlertLevel::Critical, "failed")
                .for_symbol("QQQ")
                .with_details(vec!["missing column".into()]),
        );

        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].symbol.as_deref(), Some("SPY"));
        assert_eq!(alerts[1].details, vec!["missing column"]);
        assert_eq!(sink.count(AlertLevel::Critical), 1);
    }

    #[test]
    fn tracing_sink_accepts_every_level() {
        let sink = TracingAlertSink::new(AlertLevel::Info);
        for level in [AlertLevel::Info, AlertLevel::Warning, AlertLevel::Critical] {
            sink.send(Alert::new(level, "disk nearly full"));
        }
    }

    #[test]
    fn level_serde_uses_upper_case() {
        let json = serde_json::to_string(&AlertLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        let level: AlertLevel = serde_json::from_str("\"INFO\"").unwrap();
        assert_eq!(level, AlertLevel::Info);
        assert_eq!(AlertLevel::Warning.to_string(), "WARNING");
    }
}
