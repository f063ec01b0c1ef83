//! Two-phase merge of the lanes' partial sums, regrouped by time bucket.
//!
//! Phase one runs per lane in parallel: every `(prefix, bucket) → sum` entry is
//! moved under its bucket. Phase two folds the per-lane maps together. Lane maps
//! are disjoint by routing, but the fold still merges through the combiner so a
//! repeated key would add up rather than overwrite.

use crate::combiners::{CombineFn, Sum};
use crate::error::AggregateError;
use crate::key::GroupKey;
use crate::reducer::PartialSum;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// All `(prefix, sum)` entries observed for one time bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BucketGroup {
    pub bucket: String,
    /// Sorted by prefix.
    pub entries: Vec<(String, i64)>,
}

type LocalGroups = HashMap<String, HashMap<String, i64>>;

/// Merge finished lanes and regroup by bucket. Buckets come back in ascending order.
///
/// # Errors
/// [`AggregateError::Overflow`] if a merged total does not fit in an `i64`.
pub fn merge_lanes(lanes: Vec<PartialSum>) -> Result<Vec<BucketGroup>, AggregateError> {
    let locals: Vec<LocalGroups> = lanes.into_par_iter().map(regroup_local).collect();
    merge_groups(locals)
}

fn regroup_local(lane: PartialSum) -> LocalGroups {
    let mut m: LocalGroups = HashMap::new();
    for (key, sum) in lane {
        let (prefix, bucket) = key.into_parts();
        m.entry(bucket).or_default().insert(prefix, sum);
    }
    m
}

fn merge_groups(parts: Vec<LocalGroups>) -> Result<Vec<BucketGroup>, AggregateError> {
    let comb = Sum::new();
    let mut acc: BTreeMap<String, HashMap<String, i128>> = BTreeMap::new();
    for part in parts {
        for (bucket, prefixes) in part {
            let slot = acc.entry(bucket).or_default();
            for (prefix, sum) in prefixes {
                comb.merge(slot.entry(prefix).or_insert_with(|| comb.create()), i128::from(sum));
            }
        }
    }
    acc.into_iter()
        .map(|(bucket, prefixes)| {
            let mut entries: Vec<(String, i64)> = Vec::with_capacity(prefixes.len());
            for (prefix, total) in prefixes {
                let Some(sum) = comb.finish(total) else {
                    let key = GroupKey::new(prefix, bucket.as_str()).to_string();
                    return Err(AggregateError::Overflow { key });
                };
                entries.push((prefix, sum));
            }
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(BucketGroup { bucket, entries })
        })
        .collect()
}
