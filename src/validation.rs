//! What a run does with a record that cannot be mapped.
//!
//! A record whose time field does not parse, or whose aggregated field is not an
//! integer, usually means the source is misconfigured, so the default is to fail
//! the run ([`RecordPolicy::FailFast`]). [`RecordPolicy::SkipInvalid`] instead
//! drops the record, logs it and counts it in the run metrics.
//!
//! Only record-level errors are ever skipped; see
//! [`AggregateError::is_record_level`].

use crate::error::AggregateError;
use crate::key::GroupKey;
use crate::metrics::PipelineMetrics;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Defines how to handle records that fail to map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordPolicy {
    /// Fail the run on the first malformed record
    #[default]
    FailFast,
    /// Log and count malformed records, keep going
    SkipInvalid,
}

impl RecordPolicy {
    /// Apply the policy to a mapping result.
    ///
    /// Returns `Ok(Some(pair))` to route the pair, `Ok(None)` to drop the record,
    /// or the error that ends the run.
    pub(crate) fn admit(
        self,
        mapped: Result<(GroupKey, i64), AggregateError>,
        metrics: Option<&PipelineMetrics>,
    ) -> Result<Option<(GroupKey, i64)>, AggregateError> {
        match mapped {
            Ok(pair) => Ok(Some(pair)),
            Err(err) if self == RecordPolicy::SkipInvalid && err.is_record_level() => {
                warn!(error = %err, "skipping malformed record");
                if let Some(m) = metrics {
                    m.on_skip();
                }
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coercion() -> AggregateError {
        AggregateError::TypeCoercion {
            field: "Value".into(),
            value: "\"x\"".into(),
        }
    }

    #[test]
    fn fail_fast_propagates() {
        let r = RecordPolicy::FailFast.admit(Err(coercion()), None);
        assert!(matches!(r, Err(AggregateError::TypeCoercion { .. })));
    }

    #[test]
    fn skip_invalid_drops_record_level_errors_only() {
        let metrics = PipelineMetrics::new();
        let r = RecordPolicy::SkipInvalid.admit(Err(coercion()), Some(&*metrics));
        assert!(matches!(r, Ok(None)));
        assert_eq!(metrics.records_skipped(), 1);

        let r = RecordPolicy::SkipInvalid.admit(
            Err(AggregateError::WorkerPanicked("boom".into())),
            Some(&*metrics),
        );
        assert!(r.is_err());
    }
}
