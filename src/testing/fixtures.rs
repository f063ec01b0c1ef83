//! Pre-built record sets.

use crate::record::Record;
use crate::source::StaticSource;
use chrono::{Duration, NaiveDate};

/// Five usage records of `license1`/`product1`, one per day from
/// 2024-03-01 to 2024-03-05, each with `Value` 2. Dates are text in the
/// default `%Y-%m-%d` format.
pub fn license_records() -> Vec<Record> {
    (1..=5)
        .map(|day| {
            Record::new()
                .with("LicenseId", "license1")
                .with("BilledProductId", "product1")
                .with("Date", format!("2024-03-{day:02}"))
                .with("Value", 2i64)
        })
        .collect()
}

pub fn license_source() -> StaticSource {
    StaticSource::new(license_records())
}

/// The [`license_records`] as a delimited file body with a header line.
pub const LICENSE_CSV: &str = "\
LicenseId,BilledProductId,Date,Value
license1,product1,2024-03-01,2
license1,product1,2024-03-02,2
license1,product1,2024-03-03,2
license1,product1,2024-03-04,2
license1,product1,2024-03-05,2
";

/// `count` deterministic records spread over four licenses, three products
/// and roughly two years starting 2023-01-01. Every seventh record lacks
/// `BilledProductId`.
pub fn usage_records(count: usize) -> Vec<Record> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default();
    (0..count)
        .map(|i| {
            let day = start + Duration::days(((i * 37) % 700) as i64);
            let mut rec = Record::new()
                .with("LicenseId", format!("license{}", i % 4))
                .with("Date", day.format("%Y-%m-%d").to_string())
                .with("Value", ((i * 13) % 100) as i64);
            if i % 7 != 0 {
                rec.insert("BilledProductId", format!("product{}", i % 3));
            }
            rec
        })
        .collect()
}
