//! Composite group keys.
//!
//! A [`GroupKey`] is the group-by prefix (the record's group-by values joined
//! with `,`) plus the time-bucket token. Keeping the two parts separate means
//! the merge step never has to re-split a rendered string, even when a value
//! contains a comma.

use crate::bucket::{Interval, TimeField};
use crate::error::AggregateError;
use crate::record::{Record, Value};
use crate::request::AggregationRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Substituted for a group-by field that is absent or not text.
pub const NULL_TOKEN: &str = "null";

/// Separator between group-by values and the bucket in the rendered key.
pub const KEY_SEPARATOR: char = ',';

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    prefix: String,
    bucket: String,
}

impl GroupKey {
    pub fn new(prefix: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            bucket: bucket.into(),
        }
    }

    /// Joined group-by values; empty when there are no group-by fields.
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Time-bucket token; empty when the interval is [`Interval::None`].
    #[inline]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn into_parts(self) -> (String, String) {
        (self.prefix, self.bucket)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.prefix.is_empty(), self.bucket.is_empty()) {
            (_, true) => f.write_str(&self.prefix),
            (true, false) => f.write_str(&self.bucket),
            (false, false) => write!(f, "{}{KEY_SEPARATOR}{}", self.prefix, self.bucket),
        }
    }
}

/// Builds [`GroupKey`]s for one request. Holds no mutable state.
#[derive(Clone, Debug)]
pub struct KeyBuilder {
    group_by: Vec<String>,
    interval: Interval,
    time_field: TimeField,
}

impl KeyBuilder {
    pub fn new(group_by: Vec<String>, interval: Interval, time_field: TimeField) -> Self {
        Self {
            group_by,
            interval,
            time_field,
        }
    }

    pub fn for_request(request: &AggregationRequest, time_field: &TimeField) -> Self {
        Self::new(request.group_by.clone(), request.interval, time_field.clone())
    }

    /// Derive the key of a record.
    ///
    /// # Errors
    /// [`AggregateError::DateParse`] when bucketing is on and the time field is
    /// missing, not a timestamp, or does not parse.
    pub fn build(&self, record: &Record) -> Result<GroupKey, AggregateError> {
        let mut prefix = String::new();
        for (i, field) in self.group_by.iter().enumerate() {
            if i > 0 {
                prefix.push(KEY_SEPARATOR);
            }
            prefix.push_str(record.get(field).and_then(Value::as_text).unwrap_or(NULL_TOKEN));
        }

        if self.interval.is_none() {
            return Ok(GroupKey::new(prefix, String::new()));
        }
        let ts = match record.get(&self.time_field.name) {
            Some(Value::Timestamp(ts)) => *ts,
            Some(Value::Text(text)) => self
                .time_field
                .parse(text)
                .ok_or_else(|| self.date_error(format!("{text:?}")))?,
            Some(other) => return Err(self.date_error(format!("{other} ({})", other.type_name()))),
            None => return Err(self.date_error("<missing>".to_string())),
        };
        Ok(GroupKey::new(prefix, self.interval.bucket(&ts)))
    }

    fn date_error(&self, value: String) -> AggregateError {
        AggregateError::DateParse {
            field: self.time_field.name.clone(),
            value,
            format: self.time_field.format.clone(),
        }
    }
}
