//! Execution of one aggregation run up to the per-lane partial sums.
//!
//! [`ExecMode::Sequential`] drives the source on the calling thread through an
//! inline sink that maps, routes and reduces each record immediately.
//! [`ExecMode::Parallel`] spreads the same work over scoped threads:
//!
//! ```text
//! source shards ──► record queue ──► mapper workers ──► lane queues ──► reduce lanes
//! ```
//!
//! All queues are bounded `crossbeam` channels; a producer that finds its queue
//! full blocks until there is room, and the wait is counted as a backpressure
//! event. Both modes return the same partial sums for the same input.

use crate::bucket::TimeField;
use crate::error::{AggregateError, SourceError};
use crate::key::GroupKey;
use crate::mapper::Mapper;
use crate::metrics::PipelineMetrics;
use crate::partition::Partitioner;
use crate::record::Record;
use crate::reducer::{PartialSum, ReduceLane};
use crate::request::AggregationRequest;
use crate::source::{RecordSink, RecordSource, Shard, SinkClosed};
use crate::validation::RecordPolicy;
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use std::any::Any;
use std::sync::OnceLock;
use std::thread;
use tracing::{debug, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    /// `shards` source readers (and as many mapper workers) feeding `partitions` lanes.
    Parallel {
        shards: Option<usize>,
        partitions: Option<usize>,
    },
}

#[derive(Clone, Debug)]
pub struct Runner {
    pub mode: ExecMode,
    pub default_partitions: usize,
    pub default_shards: usize,
    pub queue_capacity: usize,
    pub policy: RecordPolicy,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Parallel {
                shards: None,
                partitions: None,
            },
            default_partitions: 2 * num_cpus::get().max(2),
            default_shards: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            policy: RecordPolicy::FailFast,
        }
    }
}

impl Runner {
    pub fn sequential() -> Self {
        Self {
            mode: ExecMode::Sequential,
            ..Self::default()
        }
    }

    pub fn parallel(shards: usize, partitions: usize) -> Self {
        Self {
            mode: ExecMode::Parallel {
                shards: Some(shards),
                partitions: Some(partitions),
            },
            ..Self::default()
        }
    }

    /// Number of reduce lanes a run uses (at least one).
    pub fn partitions(&self) -> usize {
        match self.mode {
            ExecMode::Parallel {
                partitions: Some(p),
                ..
            } => p,
            _ => self.default_partitions,
        }
        .max(1)
    }

    /// Number of source shards a run reads (at least one; always one when sequential).
    pub fn shards(&self) -> usize {
        match self.mode {
            ExecMode::Sequential => 1,
            ExecMode::Parallel { shards, .. } => shards.unwrap_or(self.default_shards).max(1),
        }
    }

    /// Read, map, route and reduce every record of the request.
    ///
    /// `on_drained` is invoked once all source shards have finished without a
    /// fatal error, before the lanes are flushed.
    pub(crate) fn execute(
        &self,
        source: &dyn RecordSource,
        request: &AggregationRequest,
        time_field: &TimeField,
        metrics: Option<&PipelineMetrics>,
        on_drained: impl FnOnce(),
    ) -> Result<Vec<PartialSum>, AggregateError> {
        let mapper = Mapper::new(request, time_field);
        let partitioner = Partitioner::new(self.partitions());
        match self.mode {
            ExecMode::Sequential => {
                exec_seq(self, source, request, time_field, &mapper, &partitioner, metrics, on_drained)
            }
            ExecMode::Parallel { .. } => exec_parallel(
                self,
                source,
                request,
                time_field,
                &mapper,
                &partitioner,
                metrics,
                on_drained,
            ),
        }
    }
}

/// First fatal error of a run; later ones are dropped.
#[derive(Default)]
struct Abort {
    first: OnceLock<AggregateError>,
}

impl Abort {
    fn fail(&self, err: AggregateError) {
        if let Err(later) = self.first.set(err) {
            debug!(error = %later, "run already failing, dropping error");
        }
    }

    fn is_set(&self) -> bool {
        self.first.get().is_some()
    }

    fn into_error(self) -> Option<AggregateError> {
        self.first.into_inner()
    }
}

/// Send without blocking when possible; a full queue is a backpressure event.
fn send_counted<T>(tx: &Sender<T>, item: T, metrics: Option<&PipelineMetrics>) -> Result<(), SinkClosed> {
    match tx.try_send(item) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(item)) => {
            if let Some(m) = metrics {
                m.record_backpressure();
            }
            tx.send(item).map_err(|_| SinkClosed)
        }
        Err(TrySendError::Disconnected(_)) => Err(SinkClosed),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Maps and reduces in place, on the thread that drives the source.
struct InlineSink<'a> {
    mapper: &'a Mapper,
    partitioner: &'a Partitioner,
    policy: RecordPolicy,
    metrics: Option<&'a PipelineMetrics>,
    lanes: Vec<ReduceLane>,
    failed: Option<AggregateError>,
}

impl RecordSink for InlineSink<'_> {
    fn emit(&mut self, record: Record) -> Result<(), SinkClosed> {
        if self.failed.is_some() {
            return Err(SinkClosed);
        }
        if let Some(m) = self.metrics {
            m.on_read();
        }
        match self.policy.admit(self.mapper.map(&record), self.metrics) {
            Ok(Some((key, value))) => {
                let lane = self.partitioner.route(&key);
                if let Some(m) = self.metrics {
                    m.on_route();
                }
                self.lanes[lane].add(key, value);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                self.failed = Some(err);
                Err(SinkClosed)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn exec_seq(
    runner: &Runner,
    source: &dyn RecordSource,
    request: &AggregationRequest,
    time_field: &TimeField,
    mapper: &Mapper,
    partitioner: &Partitioner,
    metrics: Option<&PipelineMetrics>,
    on_drained: impl FnOnce(),
) -> Result<Vec<PartialSum>, AggregateError> {
    let mut sink = InlineSink {
        mapper,
        partitioner,
        policy: runner.policy,
        metrics,
        lanes: (0..partitioner.lanes()).map(ReduceLane::new).collect(),
        failed: None,
    };
    let projection = request.projection(time_field);
    let read = source.read(&request.query, &projection, Shard::whole(), &mut sink);

    if let Some(err) = sink.failed.take() {
        return Err(err);
    }
    if let Err(err) = read {
        warn!(source = source.name(), error = %err, "source read failed");
        return Err(err.into());
    }
    on_drained();

    sink.lanes
        .into_iter()
        .map(|lane| {
            debug!(lane = lane.index(), inputs = lane.inputs(), "lane drained");
            lane.finish()
        })
        .collect()
}

/// Feeds the shared record queue from one source shard.
struct ChannelSink<'a> {
    tx: Sender<Record>,
    metrics: Option<&'a PipelineMetrics>,
}

impl RecordSink for ChannelSink<'_> {
    fn emit(&mut self, record: Record) -> Result<(), SinkClosed> {
        send_counted(&self.tx, record, self.metrics)?;
        if let Some(m) = self.metrics {
            m.on_read();
        }
        Ok(())
    }
}

/// Pull records, map them and route the pairs to their lanes until the record
/// queue closes or the run fails.
fn map_worker(
    rx: Receiver<Record>,
    lanes: Vec<Sender<(GroupKey, i64)>>,
    mapper: &Mapper,
    partitioner: &Partitioner,
    policy: RecordPolicy,
    metrics: Option<&PipelineMetrics>,
    abort: &Abort,
) -> u64 {
    let mut mapped = 0u64;
    for record in rx.iter() {
        if abort.is_set() {
            break;
        }
        match policy.admit(mapper.map(&record), metrics) {
            Ok(Some((key, value))) => {
                let lane = partitioner.route(&key);
                if send_counted(&lanes[lane], (key, value), metrics).is_err() {
                    break;
                }
                if let Some(m) = metrics {
                    m.on_route();
                }
                mapped += 1;
            }
            Ok(None) => {}
            Err(err) => {
                abort.fail(err);
                break;
            }
        }
    }
    mapped
}

#[allow(clippy::too_many_arguments)]
fn exec_parallel(
    runner: &Runner,
    source: &dyn RecordSource,
    request: &AggregationRequest,
    time_field: &TimeField,
    mapper: &Mapper,
    partitioner: &Partitioner,
    metrics: Option<&PipelineMetrics>,
    on_drained: impl FnOnce(),
) -> Result<Vec<PartialSum>, AggregateError> {
    let shards = runner.shards();
    let capacity = runner.queue_capacity.max(1);
    let projection = request.projection(time_field);
    let abort = Abort::default();

    let (record_tx, record_rx) = bounded::<Record>(capacity);
    let (lane_txs, lane_rxs): (Vec<_>, Vec<_>) =
        (0..partitioner.lanes()).map(|_| bounded::<(GroupKey, i64)>(capacity)).unzip();

    let lanes = thread::scope(|s| {
        let reducers: Vec<_> = lane_rxs
            .into_iter()
            .enumerate()
            .map(|(index, rx)| {
                s.spawn(move || {
                    let mut lane = ReduceLane::new(index);
                    // Lanes always drain so upstream senders never block forever.
                    for (key, value) in rx {
                        lane.add(key, value);
                    }
                    debug!(lane = index, inputs = lane.inputs(), "lane drained");
                    lane.finish()
                })
            })
            .collect();

        let workers: Vec<_> = (0..shards)
            .map(|w| {
                let rx = record_rx.clone();
                let txs = lane_txs.clone();
                let abort = &abort;
                s.spawn(move || {
                    let mapped = map_worker(rx, txs, mapper, partitioner, runner.policy, metrics, abort);
                    debug!(worker = w, mapped, "mapper finished");
                })
            })
            .collect();
        drop(record_rx);
        drop(lane_txs);

        let readers: Vec<_> = Shard::split(shards)
            .map(|shard| {
                let mut sink = ChannelSink {
                    tx: record_tx.clone(),
                    metrics,
                };
                let projection = &projection;
                let abort = &abort;
                s.spawn(move || {
                    debug!(source = source.name(), %shard, "shard reading");
                    match source.read(&request.query, projection, shard, &mut sink) {
                        Ok(()) => debug!(%shard, "shard exhausted"),
                        // The run is already failing; the real cause is recorded.
                        Err(SourceError::Closed) => debug!(%shard, "shard stopped early"),
                        Err(err) => {
                            warn!(source = source.name(), %shard, error = %err, "source read failed");
                            abort.fail(err.into());
                        }
                    }
                })
            })
            .collect();
        drop(record_tx);

        for handle in readers {
            if let Err(payload) = handle.join() {
                abort.fail(AggregateError::WorkerPanicked(panic_message(payload)));
            }
        }
        if !abort.is_set() {
            on_drained();
        }
        for handle in workers {
            if let Err(payload) = handle.join() {
                abort.fail(AggregateError::WorkerPanicked(panic_message(payload)));
            }
        }

        let mut lanes = Vec::with_capacity(reducers.len());
        for handle in reducers {
            match handle.join() {
                Ok(Ok(partial)) => lanes.push(partial),
                Ok(Err(err)) => abort.fail(err),
                Err(payload) => abort.fail(AggregateError::WorkerPanicked(panic_message(payload))),
            }
        }
        lanes
    });

    match abort.into_error() {
        Some(err) => Err(err),
        None => Ok(lanes),
    }
}
