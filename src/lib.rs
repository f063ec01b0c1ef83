//! # groupflow
//!
//! A **streaming group-by aggregation pipeline** over loosely-typed records.
//! Records from a pluggable [`RecordSource`] are keyed by a list of group-by
//! fields plus an optional calendar bucket, summed (or counted) in parallel
//! reduce lanes, and returned as one [`ResultRow`] per time bucket.
//!
//! ## Key Features
//!
//! - **Sharded sources** - mock, in-memory, delimited files (glob, gzip/zstd) and PostgreSQL
//! - **Partitioned reduction** - stable xxh3 routing into `P` independent lanes
//! - **Two-phase merge** - per-lane regrouping by bucket, then a combiner fold
//! - **Explicit run handles** - `Idle → Running → Draining → Completed`, no global registry
//! - **Typed errors** - every malformed record or failed read ends the run, never the process
//!
//! ## Quick Start
//!
//! ```no_run
//! use groupflow::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), AggregateError> {
//! let pipeline = Pipeline::new(Arc::new(MockSource::default()))
//!     .with_mode(ExecMode::Parallel { shards: Some(2), partitions: Some(4) });
//!
//! let request = AggregationRequest::new(["LicenseId", "BilledProductId"], Interval::Monthly)
//!     .sum_of("Value");
//! for row in pipeline.run(request)? {
//!     println!("{} {:?}", row.data_key, row.groups);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Data flow
//!
//! ```text
//! RecordSource ─► Mapper (KeyBuilder) ─► Partitioner ─► ReduceLane × P ─► merge_lanes ─► flatten
//! ```
//!
//! - [`KeyBuilder`] renders `(prefix, bucket)` keys; absent group-by fields become `"null"`.
//! - [`Mapper`] pairs the key with the record's contribution (the aggregated
//!   field, or `1` when counting).
//! - [`Partitioner`] sends every key to exactly one lane, so lanes never share state.
//! - [`merge_lanes`] and [`flatten`] run after all lanes have drained.
//!
//! ## Feature Flags
//!
//! - `io-csv` (default) - [`DelimitedFileSource`]
//! - `io-sql` - [`io::sql::SqlSource`] over PostgreSQL
//! - `compression-gzip`, `compression-zstd` (default) - transparent decompression

pub mod api;
pub mod bucket;
pub mod combiners;
pub mod config;
pub mod error;
pub mod flatten;
pub mod io;
pub mod key;
pub mod logging;
pub mod mapper;
pub mod merge;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod reducer;
pub mod request;
pub mod runner;
pub mod source;
pub mod testing;
pub mod validation;

pub use api::{Response, decode_request, encode_response, handle, response_key};
pub use bucket::{Interval, TimeField};
pub use combiners::{CombineFn, Sum};
pub use config::EngineConfig;
pub use error::{AggregateError, SourceError};
pub use flatten::{DATA_KEY_COLUMN, ResultRow, TOTAL_COLUMN, flatten};
pub use key::{GroupKey, KeyBuilder, NULL_TOKEN};
pub use mapper::Mapper;
pub use merge::{BucketGroup, merge_lanes};
pub use metrics::PipelineMetrics;
pub use partition::Partitioner;
pub use pipeline::{Pipeline, PipelineHandle, PipelineState};
pub use record::{Record, Value};
pub use reducer::{PartialSum, ReduceLane};
pub use request::{AggregationRequest, Projection};
pub use runner::{ExecMode, Runner};
pub use source::{MockSource, RecordSink, RecordSource, Shard, SinkClosed, StaticSource, VecSink};
pub use validation::RecordPolicy;

#[cfg(feature = "io-csv")]
pub use io::csv::DelimitedFileSource;
