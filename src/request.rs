use crate::bucket::{Interval, TimeField};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Parameters of one aggregation run. Read-only for the run's duration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    /// Ordered group-by fields; empty means a single `total` column per bucket.
    pub group_by: Vec<String>,
    pub interval: Interval,
    /// `None` selects counting mode.
    pub aggregated_field: Option<String>,
    /// Opaque filter passed through to the source.
    pub query: String,
}

impl AggregationRequest {
    pub fn new<I, S>(group_by: I, interval: Interval) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            group_by: group_by.into_iter().map(Into::into).collect(),
            interval,
            aggregated_field: None,
            query: String::new(),
        }
    }

    #[must_use]
    pub fn sum_of(mut self, field: impl Into<String>) -> Self {
        self.aggregated_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    #[inline]
    pub fn is_counting(&self) -> bool {
        self.aggregated_field.is_none()
    }

    /// Fields the run reads from each record.
    pub fn projection(&self, time_field: &TimeField) -> Projection {
        let mut fields: BTreeSet<String> = self.group_by.iter().cloned().collect();
        if let Some(f) = &self.aggregated_field {
            fields.insert(f.clone());
        }
        if !self.interval.is_none() {
            fields.insert(time_field.name.clone());
        }
        Projection { fields }
    }
}

/// The set of fields a source needs to materialize. Empty means "everything".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    fields: BTreeSet<String>,
}

impl Projection {
    /// A projection that keeps every field.
    pub fn all() -> Self {
        Self::default()
    }

    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.is_empty() || self.fields.contains(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Projection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}
