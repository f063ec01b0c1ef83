//! Assertion functions for result rows.

use crate::flatten::ResultRow;
use std::collections::HashSet;

/// Build a row from a bucket and `(group, sum)` pairs.
///
/// ```
/// use groupflow::testing::row;
///
/// let r = row("2024-03", [("license1", 10)]);
/// assert_eq!(r.get("license1"), Some(10));
/// ```
pub fn row<I, S>(data_key: &str, groups: I) -> ResultRow
where
    I: IntoIterator<Item = (S, i64)>,
    S: Into<String>,
{
    ResultRow {
        data_key: data_key.to_string(),
        groups: groups.into_iter().map(|(g, v)| (g.into(), v)).collect(),
    }
}

fn sorted(rows: &[ResultRow]) -> Vec<&ResultRow> {
    let mut out: Vec<&ResultRow> = rows.iter().collect();
    out.sort_by(|a, b| a.data_key.cmp(&b.data_key));
    out
}

/// Assert that two row sets are equal, ignoring row order.
///
/// # Panics
///
/// Panics if the row counts differ or any row differs after sorting by `dataKey`.
pub fn assert_rows_unordered_equal(actual: &[ResultRow], expected: &[ResultRow]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (a, e) in sorted(actual).into_iter().zip(sorted(expected)) {
        assert_eq!(
            a, e,
            "Row mismatch for dataKey {:?}:\n  Expected: {e:?}\n  Actual: {a:?}",
            e.data_key
        );
    }
}

/// Assert that no two rows share a `dataKey`.
///
/// # Panics
///
/// Panics on the first duplicated `dataKey`.
pub fn assert_unique_data_keys(rows: &[ResultRow]) {
    let mut seen = HashSet::new();
    for r in rows {
        assert!(
            seen.insert(r.data_key.as_str()),
            "Duplicate dataKey {:?} in {rows:?}",
            r.data_key
        );
    }
}

/// Assert that the row for `data_key` holds `expected` under `group`.
///
/// # Panics
///
/// Panics if the row or the group is missing, or the value differs.
pub fn assert_row_value(rows: &[ResultRow], data_key: &str, group: &str, expected: i64) {
    let Some(r) = rows.iter().find(|r| r.data_key == data_key) else {
        panic!("No row with dataKey {data_key:?} in {rows:?}");
    };
    assert_eq!(
        r.get(group),
        Some(expected),
        "Unexpected value for {group:?} in row {data_key:?}: {r:?}"
    );
}

/// Sum of every group value over all rows.
pub fn rows_total(rows: &[ResultRow]) -> i64 {
    rows.iter().flat_map(|r| r.groups.values()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unordered_equal_ignores_order() {
        let a = vec![row("2024", [("x", 1)]), row("2023", [("x", 2)])];
        let b = vec![row("2023", [("x", 2)]), row("2024", [("x", 1)])];
        assert_rows_unordered_equal(&a, &b);
        assert_eq!(rows_total(&a), 3);
    }

    #[test]
    #[should_panic(expected = "Duplicate dataKey")]
    fn duplicate_keys_detected() {
        assert_unique_data_keys(&[row("2024", [("x", 1)]), row("2024", [("y", 1)])]);
    }
}
