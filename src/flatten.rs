use crate::error::AggregateError;
use crate::merge::BucketGroup;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column name used for an empty group prefix (no group-by fields).
pub const TOTAL_COLUMN: &str = "total";

/// Column holding the row's time bucket.
pub const DATA_KEY_COLUMN: &str = "dataKey";

/// One output row: a time bucket and one sum per group prefix seen in it.
///
/// Serializes flat, e.g. `{"dataKey":"2024-03","license1,product1":10}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "dataKey")]
    pub data_key: String,
    #[serde(flatten)]
    pub groups: BTreeMap<String, i64>,
}

impl ResultRow {
    #[inline]
    pub fn get(&self, group: &str) -> Option<i64> {
        self.groups.get(group).copied()
    }
}

/// Build one row per bucket group; an empty prefix becomes [`TOTAL_COLUMN`].
///
/// # Errors
/// [`AggregateError::ReservedColumn`] if a group would be written to the
/// [`DATA_KEY_COLUMN`] or share a column with another group.
pub fn flatten(groups: Vec<BucketGroup>) -> Result<Vec<ResultRow>, AggregateError> {
    groups.into_par_iter().map(flatten_one).collect()
}

fn flatten_one(group: BucketGroup) -> Result<ResultRow, AggregateError> {
    let mut row = ResultRow {
        data_key: group.bucket,
        groups: BTreeMap::new(),
    };
    for (prefix, sum) in group.entries {
        let column = if prefix.is_empty() {
            TOTAL_COLUMN.to_string()
        } else {
            prefix
        };
        if column == DATA_KEY_COLUMN {
            return Err(AggregateError::ReservedColumn { column });
        }
        // An empty prefix and a literal "total" group land on the same column.
        if row.groups.contains_key(&column) {
            return Err(AggregateError::ReservedColumn { column });
        }
        row.groups.insert(column, sum);
    }
    Ok(row)
}
