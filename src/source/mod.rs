//! The "produce records" contract and the in-process sources.
//!
//! A [`RecordSource`] streams [`Record`]s into a [`RecordSink`]. The pipeline
//! calls [`RecordSource::read`] once per [`Shard`], possibly from several
//! threads at once; each call must emit exactly the rows that shard owns, so the
//! shards of one read partition the dataset.
//!
//! File and database backends live under [`crate::io`]; this module holds the
//! contract itself plus the synthetic [`MockSource`] and the fixed-list
//! [`StaticSource`].

mod mock;

pub use mock::{MockSource, StaticSource};

use crate::error::SourceError;
use crate::record::Record;
use crate::request::Projection;
use std::fmt;

/// Produces records for a run.
pub trait RecordSource: Send + Sync {
    /// Emit every record of `shard` into `sink`, then return.
    ///
    /// `query` is the request's opaque filter; `projection` names the fields the
    /// run reads and may be used to skip materializing the rest.
    ///
    /// # Errors
    /// Any error aborts the run that issued the read. A [`SinkClosed`] from the
    /// sink should be propagated (it converts into [`SourceError::Closed`]).
    fn read(
        &self,
        query: &str,
        projection: &Projection,
        shard: Shard,
        sink: &mut dyn RecordSink,
    ) -> Result<(), SourceError>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "source"
    }
}

/// Write-only end of the record stream.
pub trait RecordSink {
    /// # Errors
    /// [`SinkClosed`] once the run has stopped accepting records.
    fn emit(&mut self, record: Record) -> Result<(), SinkClosed>;
}

/// Returned by a sink whose run is aborting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SinkClosed;

impl fmt::Display for SinkClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("record sink closed")
    }
}

impl std::error::Error for SinkClosed {}

/// A sink that buffers everything in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<Record>,
}

impl RecordSink for VecSink {
    fn emit(&mut self, record: Record) -> Result<(), SinkClosed> {
        self.records.push(record);
        Ok(())
    }
}

/// One of `count` disjoint slices of a read. Rows are assigned round-robin by
/// their position in the source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shard {
    pub index: usize,
    pub count: usize,
}

impl Shard {
    /// The single shard that owns every row.
    pub fn whole() -> Self {
        Self { index: 0, count: 1 }
    }

    /// All shards of an `n`-way split (at least one).
    pub fn split(n: usize) -> impl Iterator<Item = Shard> {
        let count = n.max(1);
        (0..count).map(move |index| Shard { index, count })
    }

    #[inline]
    pub fn owns(&self, row: u64) -> bool {
        self.count <= 1 || row % self.count as u64 == self.index as u64
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index + 1, self.count)
    }
}
