//! Combiners used by the reduction lanes and the merge step.
//!
//! A [`CombineFn`] describes a per-key aggregation as an accumulator with an
//! identity (`create`), an element-wise step (`add_input`), an accumulator merge
//! (`merge`) and a projection (`finish`). Lanes call `add_input`, the merge step
//! calls `merge`; because the accumulator forms a commutative monoid the result
//! does not depend on how keys were partitioned or in which order values arrived.

pub trait CombineFn<V, A, O>: Send + Sync + 'static {
    fn create(&self) -> A;
    fn add_input(&self, acc: &mut A, v: V);
    fn merge(&self, acc: &mut A, other: A);
    fn finish(&self, acc: A) -> O;
}

/* ===================== Sum ===================== */

/// Exact `i64` sum. Accumulates in `i128`, so intermediate totals never wrap
/// whatever the input order; `finish` yields `None` when the final total does
/// not fit in an `i64`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sum;

impl Sum {
    pub const fn new() -> Self {
        Sum
    }
}

impl CombineFn<i64, i128, Option<i64>> for Sum {
    fn create(&self) -> i128 {
        0
    }

    fn add_input(&self, acc: &mut i128, v: i64) {
        *acc = acc.saturating_add(i128::from(v));
    }

    fn merge(&self, acc: &mut i128, other: i128) {
        *acc = acc.saturating_add(other);
    }

    fn finish(&self, acc: i128) -> Option<i64> {
        i64::try_from(acc).ok()
    }
}
