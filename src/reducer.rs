use crate::combiners::{CombineFn, Sum};
use crate::error::AggregateError;
use crate::key::GroupKey;
use std::collections::HashMap;
use std::collections::hash_map::IntoIter;

/// Lane-local running totals, GroupKey → sum.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialSum {
    sums: HashMap<GroupKey, i64>,
}

impl PartialSum {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, key: &GroupKey) -> Option<i64> {
        self.sums.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &i64)> {
        self.sums.iter()
    }
}

impl IntoIterator for PartialSum {
    type Item = (GroupKey, i64);
    type IntoIter = IntoIter<GroupKey, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.sums.into_iter()
    }
}

/// One reduction lane. Owns its [`PartialSum`] exclusively; nothing else reads
/// or writes it until [`ReduceLane::finish`] hands it to the merge step.
#[derive(Debug)]
pub struct ReduceLane {
    index: usize,
    combiner: Sum,
    acc: HashMap<GroupKey, i128>,
    inputs: u64,
}

impl ReduceLane {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            combiner: Sum::new(),
            acc: HashMap::new(),
            inputs: 0,
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of pairs this lane has consumed.
    #[inline]
    pub fn inputs(&self) -> u64 {
        self.inputs
    }

    #[inline]
    pub fn add(&mut self, key: GroupKey, value: i64) {
        let comb = &self.combiner;
        comb.add_input(self.acc.entry(key).or_insert_with(|| comb.create()), value);
        self.inputs += 1;
    }

    /// # Errors
    /// [`AggregateError::Overflow`] if a key's total does not fit in an `i64`.
    pub fn finish(self) -> Result<PartialSum, AggregateError> {
        let comb = self.combiner;
        let sums = self
            .acc
            .into_iter()
            .map(|(k, a)| match comb.finish(a) {
                Some(sum) => Ok((k, sum)),
                None => Err(AggregateError::Overflow { key: k.to_string() }),
            })
            .collect::<Result<_, _>>()?;
        Ok(PartialSum { sums })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_sums_per_key() {
        let mut lane = ReduceLane::new(0);
        let a = GroupKey::new("a", "2024");
        let b = GroupKey::new("b", "2024");
        lane.add(a.clone(), 2);
        lane.add(b.clone(), 5);
        lane.add(a.clone(), 3);
        assert_eq!(lane.inputs(), 3);
        let sums = lane.finish().unwrap();
        assert_eq!(sums.len(), 2);
        assert_eq!(sums.get(&a), Some(5));
        assert_eq!(sums.get(&b), Some(5));
    }

    #[test]
    fn out_of_range_total_fails_finish() {
        let mut lane = ReduceLane::new(0);
        let a = GroupKey::new("a", "2024");
        lane.add(a.clone(), i64::MAX);
        lane.add(a, 1);
        lane.add(GroupKey::new("b", "2024"), 1);
        let err = lane.finish().unwrap_err();
        assert!(matches!(err, AggregateError::Overflow { .. }));
    }
}
