//! Operation timing for one batch.
//!
//! Each fetch, process and store is bracketed by `start`/`finish`. After
//! the batch, `issues` turns failed and slow operations into
//! human-readable lines for the alert sink.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Handle returned by `MetricsCollector::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(usize);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum OperationStatus {
    Started,
    Success,
    Error(String),
}

/// One timed operation as seen from outside the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetric {
    pub operation: String,
    pub symbol: String,
    /// `None` while the operation is still running.
    pub duration_secs: Option<f64>,
    #[serde(flatten)]
    pub status: OperationStatus,
}

#[derive(Debug)]
struct Record {
    operation: String,
    symbol: String,
    started: Instant,
    duration: Option<Duration>,
    status: OperationStatus,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    records: Mutex<Vec<Record>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, operation: &str, symbol: &str) -> OperationId {
        let mut records = self.lock();
        records.push(Record {
            operation: operation.to_string(),
            symbol: symbol.to_string(),
            started: Instant::now(),
            duration: None,
            status: OperationStatus::Started,
        });
        OperationId(records.len() - 1)
    }

    /// Close an operation. Finishing twice keeps the first outcome.
    pub fn finish(&self, id: OperationId, outcome: Result<(), String>) {
        let mut records = self.lock();
        if let Some(record) = records.get_mut(id.0) {
            if record.status != OperationStatus::Started {
                return;
            }
            record.duration = Some(record.started.elapsed());
            record.status = match outcome {
                Ok(()) => OperationStatus::Success,
                Err(e) => OperationStatus::Error(e),
            };
        }
    }

    /// Time `f` as `operation` for `symbol`, recording its outcome.
    pub fn time<T, E: std::fmt::Display>(
        &self,
        operation: &str,
        symbol: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let id = self.start(operation, symbol);
        let result = f();
        self.finish(
            id,
            result.as_ref().map(|_| ()).map_err(|e| e.to_string()),
        );
        result
    }

    /// Every operation so far, in start order.
    pub fn snapshot(&self) -> Vec<OperationMetric> {
        self.lock()
            .iter()
            .map(|r| OperationMetric {
                operation: r.operation.clone(),
                symbol: r.symbol.clone(),
                duration_secs: r.duration.map(|d| d.as_secs_f64()),
                status: r.status.clone(),
            })
            .collect()
    }

    /// Failed operations and SLA overruns.
    ///
    /// `sla_secs` maps operation names to their limit; operations without
    /// an entry are only reported when they fail.
    pub fn issues(&self, sla_secs: &BTreeMap<String, u64>) -> Vec<String> {
        issues_in(&self.snapshot(), sla_secs)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn issues_in(metrics: &[OperationMetric], sla_secs: &BTreeMap<String, u64>) -> Vec<String> {
    let mut issues = Vec::new();
    for m in metrics {
        match (&m.status, m.duration_secs) {
            (OperationStatus::Error(e), _) => issues.push(format!(
                "Operation {} failed for {}: {e}",
                m.operation, m.symbol
            )),
            (OperationStatus::Success, Some(secs)) => {
                if let Some(&limit) = sla_secs.get(&m.operation) {
                    if secs > limit as f64 {
                        issues.push(format!(
                            "Operation {} exceeded SLA for {}: {secs:.2}s",
                            m.operation, m.symbol
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(op: &str, secs: f64, status: OperationStatus) -> OperationMetric {
        OperationMetric {
            operation: op.into(),
            symbol: "SPY".into(),
            duration_secs: Some(secs),
            status,
        }
    }

    #[test]
    fn start_finish_records_outcome() {
        let metrics = MetricsCollector::new();
        let ok = metrics.start("fetch", "SPY");
        let bad = metrics.start("process", "SPY");
        metrics.finish(ok, Ok(()));
        metrics.finish(bad, Err("boom".into()));

        let snap = metrics.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].status, OperationStatus::Success);
        assert!(snap[0].duration_secs.is_some());
        assert_eq!(snap[1].status, OperationStatus::Error("boom".into()));
    }

    #[test]
    fn finish_twice_keeps_first_outcome() {
        let metrics = MetricsCollector::new();
        let id = metrics.start("store", "SPY");
        metrics.finish(id, Ok(()));
        metrics.finish(id, Err("late".into()));
        assert_eq!(metrics.snapshot()[0].status, OperationStatus::Success);
    }

    #[test]
    fn unfinished_operations_are_not_issues() {
        let metrics = MetricsCollector::new();
        metrics.start("fetch", "SPY");
        assert!(metrics.issues(&BTreeMap::new()).is_empty());
        assert_eq!(metrics.snapshot()[0].duration_secs, None);
    }

    #[test]
    fn failures_and_overruns_are_reported() {
        let sla: BTreeMap<String, u64> = [("fetch".to_string(), 10)].into_iter().collect();
        let metrics = [
            metric("fetch", 2.0, OperationStatus::Success),
            metric("fetch", 12.5, OperationStatus::Success),
            metric("process", 99.0, OperationStatus::Success),
            metric("store", 0.1, OperationStatus::Error("disk full".into())),
        ];
        assert_eq!(
            issues_in(&metrics, &sla),
            vec![
                "Operation fetch exceeded SLA for SPY: 12.50s".to_string(),
                "Operation store failed for SPY: disk full".to_string(),
            ]
        );
    }

    #[test]
    fn time_wraps_closure() {
        let metrics = MetricsCollector::new();
        let value: Result<u32, String> = metrics.time("process", "QQQ", || Ok(7));
        assert_eq!(value, Ok(7));
        let err: Result<u32, String> = metrics.time("store", "QQQ", || Err("nope".into()));
        assert!(err.is_err());

        let issues = metrics.issues(&BTreeMap::new());
        assert_eq!(issues, vec!["Operation store failed for QQQ: nope".to_string()]);
    }

    #[test]
    fn metric_serializes_flat() {
        let m = metric("fetch", 1.5, OperationStatus::Error("x".into()));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "x");
        assert_eq!(json["operation"], "fetch");
    }
}
