//! Run statistics for aggregation pipelines.
//!
//! [`PipelineMetrics`] is a set of atomic counters shared between the source
//! shards, mapper workers and lanes of a run. Attach one to a
//! [`Pipeline`](crate::pipeline::Pipeline) and read it after the run:
//!
//! ```no_run
//! use groupflow::*;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = PipelineMetrics::new();
//! let pipeline = Pipeline::new(Arc::new(MockSource::default())).with_metrics(Arc::clone(&metrics));
//! pipeline.run(AggregationRequest::new(["LicenseId"], Interval::Monthly))?;
//!
//! metrics.print();
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! Counters accumulate across runs of the same pipeline; call
//! [`PipelineMetrics::reset`] between runs for per-run numbers.

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    runs: AtomicU64,
    failed_runs: AtomicU64,
    records_read: AtomicU64,
    records_skipped: AtomicU64,
    pairs_routed: AtomicU64,
    backpressure_events: AtomicU64,
    distinct_keys: AtomicU64,
    rows_emitted: AtomicU64,
    last_run_micros: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_read(&self) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_skip(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_route(&self) {
        self.pairs_routed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_distinct_keys(&self, n: u64) {
        self.distinct_keys.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_rows(&self, n: u64) {
        self.rows_emitted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn on_run_finished(&self, elapsed: Duration, ok: bool) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_runs.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.last_run_micros.store(micros, Ordering::Relaxed);
    }

    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn failed_runs(&self) -> u64 {
        self.failed_runs.load(Ordering::Relaxed)
    }

    pub fn records_read(&self) -> u64 {
        self.records_read.load(Ordering::Relaxed)
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    pub fn pairs_routed(&self) -> u64 {
        self.pairs_routed.load(Ordering::Relaxed)
    }

    pub fn backpressure_events(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }

    pub fn distinct_keys(&self) -> u64 {
        self.distinct_keys.load(Ordering::Relaxed)
    }

    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted.load(Ordering::Relaxed)
    }

    pub fn last_run_time(&self) -> Duration {
        Duration::from_micros(self.last_run_micros.load(Ordering::Relaxed))
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for c in [
            &self.runs,
            &self.failed_runs,
            &self.records_read,
            &self.records_skipped,
            &self.pairs_routed,
            &self.backpressure_events,
            &self.distinct_keys,
            &self.rows_emitted,
            &self.last_run_micros,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }

    /// Metric name → current value, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("runs", self.runs()),
            ("failed_runs", self.failed_runs()),
            ("records_read", self.records_read()),
            ("records_skipped", self.records_skipped()),
            ("pairs_routed", self.pairs_routed()),
            ("backpressure_events", self.backpressure_events()),
            ("distinct_keys", self.distinct_keys()),
            ("rows_emitted", self.rows_emitted()),
            ("last_run_time_us", self.last_run_micros.load(Ordering::Relaxed)),
        ])
    }

    pub fn to_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        for (name, value) in self.snapshot() {
            out.insert(name.to_string(), json!(value));
        }
        Value::Object(out)
    }

    /// Print all metrics to stdout in a human-readable format.
    pub fn print(&self) {
        println!("\n========== Pipeline Metrics ==========");
        let elapsed = self.last_run_time();
        println!(
            "Last Run Time: {:.3}s ({} ms)",
            elapsed.as_secs_f64(),
            elapsed.as_millis()
        );
        println!("--------------------------------------");
        for (name, value) in self.snapshot() {
            println!("{name}: {value}");
        }
        println!("======================================\n");
    }

    /// Save all metrics to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written to.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted = serde_json::to_string_pretty(&self.to_json())?;
        let mut file =
            File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
