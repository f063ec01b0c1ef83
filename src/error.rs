//! Error taxonomy for aggregation runs.
//!
//! [`AggregateError`] is what a run (or startup) fails with. Record-level
//! failures ([`AggregateError::TypeCoercion`], [`AggregateError::DateParse`])
//! can be downgraded to skips by [`RecordPolicy::SkipInvalid`](crate::validation::RecordPolicy);
//! everything else always ends the run.
//!
//! [`SourceError`] is what a [`RecordSource`](crate::source::RecordSource) returns.
//! It only ever fails the run that issued the read.

use thiserror::Error;

/// Errors produced while configuring or executing an aggregation.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Invalid configuration detected at startup (unknown source, missing file, zero lanes).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The inbound request could not be decoded.
    #[error("malformed request: {0}")]
    BadRequest(String),

    /// The record source failed while streaming.
    #[error("source read failed: {0}")]
    Source(#[from] SourceError),

    /// The aggregated field is absent or cannot be read as an integer.
    #[error("aggregated field `{field}` is not numeric: {value}")]
    TypeCoercion { field: String, value: String },

    /// The time field is absent or does not match the configured format.
    #[error("time field `{field}` value {value} does not match format `{format}`")]
    DateParse {
        field: String,
        value: String,
        format: String,
    },

    /// A group total does not fit in a 64-bit integer.
    #[error("sum for group `{key}` overflows a 64-bit integer")]
    Overflow { key: String },

    /// A group column would collide with a fixed column of the result row.
    #[error("group `{column}` collides with the reserved `{column}` column")]
    ReservedColumn { column: String },

    /// The response could not be serialized.
    #[error("encode response: {0}")]
    Encode(#[from] serde_json::Error),

    /// A pipeline worker thread panicked.
    #[error("pipeline worker panicked: {0}")]
    WorkerPanicked(String),
}

impl AggregateError {
    /// Whether the error describes a single malformed record rather than the run itself.
    #[must_use]
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::TypeCoercion { .. } | Self::DateParse { .. })
    }

    /// Short machine-readable name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::BadRequest(_) => "bad_request",
            Self::Source(_) => "source",
            Self::TypeCoercion { .. } => "type_coercion",
            Self::DateParse { .. } => "date_parse",
            Self::Overflow { .. } => "overflow",
            Self::ReservedColumn { .. } => "reserved_column",
            Self::Encode(_) => "encode",
            Self::WorkerPanicked(_) => "worker_panicked",
        }
    }

    /// HTTP status an outer request layer should answer with.
    ///
    /// Malformed requests keep the "no content" answer of the request contract;
    /// processing failures are separated from server faults.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 204,
            Self::TypeCoercion { .. }
            | Self::DateParse { .. }
            | Self::Overflow { .. }
            | Self::ReservedColumn { .. } => 422,
            Self::Source(_) => 502,
            Self::Configuration(_) | Self::Encode(_) | Self::WorkerPanicked(_) => 500,
        }
    }
}

/// Errors returned by record sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "io-csv")]
    #[error("delimited read failed in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("invalid file pattern `{pattern}`: {message}")]
    Glob { pattern: String, message: String },

    #[error("query failed: {0}")]
    Query(String),

    /// The sink stopped accepting records because the run is aborting.
    #[error("record sink closed")]
    Closed,
}

impl From<crate::source::SinkClosed> for SourceError {
    fn from(_: crate::source::SinkClosed) -> Self {
        Self::Closed
    }
}
