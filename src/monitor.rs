//! Performance monitoring: named marks, derived measures, and debug-gated
//! reporting.
//!
//! The monitor is always cheap to write to; the loader records its phase
//! marks unconditionally. Reporting is a separate, opt-in concern: the
//! orchestrator spawns the report tasks only when the debug flag is on, so
//! a production page pays for a few map inserts and nothing else.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Records named instants and durations for one page lifetime.
#[derive(Debug)]
pub struct PerfMonitor {
    origin: Instant,
    marks: RwLock<HashMap<String, Instant>>,
    measures: RwLock<IndexMap<String, Duration>>,
}

impl PerfMonitor {
    /// Creates a monitor whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            marks: RwLock::new(HashMap::new()),
            measures: RwLock::new(IndexMap::new()),
        }
    }

    /// Records a named instant. Re-marking a name overwrites it.
    pub fn mark(&self, name: impl Into<String>) {
        self.marks.write().insert(name.into(), Instant::now());
    }

    /// Records the duration between two existing marks under `name`.
    /// Returns `None` when either mark is missing.
    pub fn measure_between(
        &self,
        name: impl Into<String>,
        start: &str,
        end: &str,
    ) -> Option<Duration> {
        let duration = {
            let marks = self.marks.read();
            let start_at = marks.get(start)?;
            let end_at = marks.get(end)?;
            end_at.saturating_duration_since(*start_at)
        };
        self.measures.write().insert(name.into(), duration);
        Some(duration)
    }

    /// Records the duration from an existing mark to now under `name`.
    pub fn measure_since(&self, name: impl Into<String>, start: &str) -> Option<Duration> {
        let start_at = *self.marks.read().get(start)?;
        let duration = start_at.elapsed();
        self.measures.write().insert(name.into(), duration);
        Some(duration)
    }

    /// Returns true if a mark with this name exists.
    pub fn has_mark(&self, name: &str) -> bool {
        self.marks.read().contains_key(name)
    }

    /// Returns the recorded measures in recording order.
    pub fn measures(&self) -> Vec<(String, Duration)> {
        self.measures
            .read()
            .iter()
            .map(|(name, duration)| (name.clone(), *duration))
            .collect()
    }

    /// Time elapsed since the monitor was created.
    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    /// JSON summary: uptime, mark offsets from the origin, and measures,
    /// all in milliseconds.
    pub fn to_json(&self) -> serde_json::Value {
        let marks: serde_json::Map<String, serde_json::Value> = self
            .marks
            .read()
            .iter()
            .map(|(name, at)| {
                let offset = at.saturating_duration_since(self.origin);
                (name.clone(), json!(offset.as_millis() as u64))
            })
            .collect();
        let measures: serde_json::Map<String, serde_json::Value> = self
            .measures
            .read()
            .iter()
            .map(|(name, duration)| (name.clone(), json!(duration.as_millis() as u64)))
            .collect();
        json!({
            "uptime_ms": self.elapsed().as_millis() as u64,
            "marks_ms": marks,
            "measures_ms": measures,
        })
    }
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Handles for the spawned report tasks, surrendered to teardown.
#[derive(Debug)]
pub struct ReportTasks {
    delayed: JoinHandle<()>,
    interval: JoinHandle<()>,
}

impl ReportTasks {
    /// Aborts both report tasks.
    pub fn abort(&self) {
        self.delayed.abort();
        self.interval.abort();
    }
}

/// Spawns the delayed one-shot report and the recurring report.
///
/// Callers gate this on the debug flag; with the flag off nothing is ever
/// spawned. `extras` is evaluated per report and merged into the log line
/// (loader status, scheduler counters).
pub fn spawn_reporting(
    monitor: Arc<PerfMonitor>,
    delay: Duration,
    every: Duration,
    extras: impl Fn() -> serde_json::Value + Send + Sync + 'static,
) -> ReportTasks {
    let extras = Arc::new(extras);

    let delayed = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        let extras = Arc::clone(&extras);
        async move {
            tokio::time::sleep(delay).await;
            report(&monitor, "startup", &extras());
        }
    });

    let interval = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so reports are spaced
        // a full interval apart.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            report(&monitor, "interval", &extras());
        }
    });

    ReportTasks { delayed, interval }
}

fn report(monitor: &PerfMonitor, kind: &str, extras: &serde_json::Value) {
    info!(kind, timings = %monitor.to_json(), extras = %extras, "performance report");
}
