//! The pipeline orchestrator: configuration, run lifecycle and result handoff.
//!
//! A [`Pipeline`] is cheap to clone and can run any number of requests, one
//! after another or concurrently. Each [`Pipeline::start`] spawns a run thread
//! and hands back a [`PipelineHandle`] the caller owns; there is no registry of
//! runs. A run moves through [`PipelineState`]:
//!
//! ```text
//! Idle ──► Running ──► Draining ──► Completed
//!              └──── fatal error ────┘
//! ```

use crate::bucket::TimeField;
use crate::config::EngineConfig;
use crate::error::AggregateError;
use crate::flatten::{ResultRow, flatten};
use crate::merge::merge_lanes;
use crate::metrics::PipelineMetrics;
use crate::request::AggregationRequest;
use crate::runner::{ExecMode, Runner};
use crate::source::RecordSource;
use crate::validation::RecordPolicy;
use crossbeam::channel::{Receiver, bounded};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{error, info};

/// Lifecycle of one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipelineState {
    /// Created, sources not started yet.
    Idle = 0,
    /// Sources are producing; mapping and reducing run concurrently.
    Running = 1,
    /// Every source shard is exhausted; lanes are flushing and results are being merged.
    Draining = 2,
    /// Results (or the run's error) are final. Terminal.
    Completed = 3,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Completed,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Completed => "completed",
        })
    }
}

#[derive(Clone, Debug, Default)]
struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn set(&self, state: PipelineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }
}

type RunResult = Result<Vec<ResultRow>, AggregateError>;

#[derive(Clone)]
pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    runner: Runner,
    time_field: TimeField,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field("runner", &self.runner)
            .field("time_field", &self.time_field)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// A pipeline over `source` with the default runner and time field.
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            runner: Runner::default(),
            time_field: TimeField::default(),
            metrics: None,
        }
    }

    /// Build the source, runner and time field described by `config`.
    ///
    /// # Errors
    /// [`AggregateError::Configuration`] if the config is invalid or names an unknown source.
    pub fn from_config(config: &EngineConfig) -> Result<Self, AggregateError> {
        config.validate()?;
        let source = config.build_source()?;
        Ok(Self::new(source)
            .with_runner(config.runner())
            .with_time_field(config.time_field()))
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Runner) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.runner.mode = mode;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RecordPolicy) -> Self {
        self.runner.policy = policy;
        self
    }

    #[must_use]
    pub fn with_time_field(mut self, time_field: TimeField) -> Self {
        self.time_field = time_field;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn time_field(&self) -> &TimeField {
        &self.time_field
    }

    pub fn metrics(&self) -> Option<&Arc<PipelineMetrics>> {
        self.metrics.as_ref()
    }

    pub fn source(&self) -> &Arc<dyn RecordSource> {
        &self.source
    }

    /// Start a run in the background.
    pub fn start(&self, request: AggregationRequest) -> PipelineHandle {
        let state = StateCell::default();
        let (tx, rx) = bounded::<RunResult>(1);

        let ctx = self.clone();
        let run_state = state.clone();
        let run_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("groupflow-run".to_string())
            .spawn(move || {
                let result = ctx.execute(request, &run_state);
                run_state.set(PipelineState::Completed);
                // The handle may already be gone; nobody wants the result then.
                let _ = run_tx.send(result);
            });

        let worker = match spawned {
            Ok(h) => Some(h),
            Err(e) => {
                error!(error = %e, "could not spawn run thread");
                state.set(PipelineState::Completed);
                let _ = tx.send(Err(AggregateError::WorkerPanicked(format!(
                    "spawn run thread: {e}"
                ))));
                None
            }
        };

        PipelineHandle {
            state,
            result: rx,
            worker,
        }
    }

    /// Start a run and wait for its rows.
    ///
    /// # Errors
    /// The first fatal error of the run.
    pub fn run(&self, request: AggregationRequest) -> RunResult {
        self.start(request).collect()
    }

    fn execute(&self, request: AggregationRequest, state: &StateCell) -> RunResult {
        state.set(PipelineState::Running);
        info!(
            source = self.source.name(),
            group_by = ?request.group_by,
            interval = %request.interval,
            aggregated_field = request.aggregated_field.as_deref().unwrap_or("<count>"),
            lanes = self.runner.partitions(),
            shards = self.runner.shards(),
            "run started"
        );
        let started = Instant::now();
        let metrics = self.metrics.as_deref();

        let result = self
            .runner
            .execute(self.source.as_ref(), &request, &self.time_field, metrics, || {
                state.set(PipelineState::Draining)
            })
            .and_then(|lanes| {
                let keys: usize = lanes.iter().map(|l| l.len()).sum();
                let rows = flatten(merge_lanes(lanes)?)?;
                if let Some(m) = metrics {
                    m.add_distinct_keys(keys as u64);
                    m.add_rows(rows.len() as u64);
                }
                Ok(rows)
            });

        let elapsed = started.elapsed();
        match &result {
            Ok(rows) => info!(rows = rows.len(), elapsed_ms = elapsed.as_millis() as u64, "run completed"),
            Err(err) => error!(kind = err.kind(), error = %err, "run failed"),
        }
        if let Some(m) = metrics {
            m.on_run_finished(elapsed, result.is_ok());
        }
        result
    }
}

/// Caller-owned handle of one run.
///
/// Dropping the handle (or calling [`close`](Self::close)) releases the run
/// without reading its result; either way the call blocks until the run's
/// threads have exited.
#[derive(Debug)]
pub struct PipelineHandle {
    state: StateCell,
    result: Receiver<RunResult>,
    worker: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// Block until the run completes and take its rows.
    ///
    /// # Errors
    /// The run's fatal error, or [`AggregateError::WorkerPanicked`] if the run
    /// thread died without reporting.
    pub fn collect(mut self) -> RunResult {
        let out = self.result.recv().unwrap_or_else(|_| {
            Err(AggregateError::WorkerPanicked(
                "run thread exited without a result".to_string(),
            ))
        });
        self.release();
        out
    }

    /// Release the run without collecting.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(h) = self.worker.take()
            && h.join().is_err()
        {
            error!("run thread panicked");
        }
        self.state.set(PipelineState::Completed);
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.release();
    }
}
