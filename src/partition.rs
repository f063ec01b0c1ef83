//! Hash routing of group keys to reduction lanes.
//!
//! Every occurrence of a key lands in the same lane, so each lane can reduce
//! on its own and the merge step is a plain union.

use crate::key::GroupKey;
use xxhash_rust::xxh3::Xxh3;

/// Routes keys to one of `lanes` partitions with a platform-stable hash.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Partitioner {
    lanes: usize,
}

impl Partitioner {
    /// `lanes` is clamped to at least one.
    pub fn new(lanes: usize) -> Self {
        Self { lanes: lanes.max(1) }
    }

    #[inline]
    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Lane index in `0..lanes`.
    #[inline]
    pub fn route(&self, key: &GroupKey) -> usize {
        if self.lanes == 1 {
            return 0;
        }
        (key_hash(key) % self.lanes as u64) as usize
    }
}

/// xxh3 over `prefix ‖ 0x1F ‖ bucket`; the unit separator keeps
/// `("a", "b,c")` and `("a,b", "c")` apart.
#[inline]
pub fn key_hash(key: &GroupKey) -> u64 {
    let mut h = Xxh3::new();
    h.update(key.prefix().as_bytes());
    h.update(&[0x1f]);
    h.update(key.bucket().as_bytes());
    h.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_lane_takes_everything() {
        let p = Partitioner::new(0);
        assert_eq!(p.lanes(), 1);
        assert_eq!(p.route(&GroupKey::new("x", "2024")), 0);
    }

    #[test]
    fn routing_is_stable_and_in_range() {
        let p = Partitioner::new(7);
        for i in 0..200 {
            let k = GroupKey::new(format!("license{i}"), "2024-01");
            let lane = p.route(&k);
            assert!(lane < 7);
            assert_eq!(lane, p.route(&k.clone()));
        }
    }

    #[test]
    fn separator_distinguishes_split_points() {
        assert_ne!(
            key_hash(&GroupKey::new("a", "b,c")),
            key_hash(&GroupKey::new("a,b", "c"))
        );
    }
}
