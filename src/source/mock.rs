use super::{RecordSink, RecordSource, Shard};
use crate::error::SourceError;
use crate::record::Record;
use crate::request::Projection;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Synthetic usage data: one `license1` row per product per day, going back
/// `days` days from `anchor`.
///
/// Fields: `LicenseId` (text), `BilledProductId` (text, `product0..`), `Date`
/// (timestamp) and `Value` (integer in `0..100`). With a `seed`, values depend
/// only on the row position, so any shard split yields the same dataset.
#[derive(Clone, Debug)]
pub struct MockSource {
    pub days: u32,
    pub products: u32,
    pub anchor: DateTime<Utc>,
    pub seed: Option<u64>,
}

impl Default for MockSource {
    fn default() -> Self {
        Self {
            days: 365,
            products: 2,
            anchor: Utc::now(),
            seed: None,
        }
    }
}

impl MockSource {
    /// Total number of rows the source emits.
    pub fn len(&self) -> u64 {
        u64::from(self.days) * u64::from(self.products)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value_for(&self, row: u64) -> i64 {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ row).gen_range(0..100),
            None => rand::thread_rng().gen_range(0..100),
        }
    }
}

impl RecordSource for MockSource {
    fn read(
        &self,
        _query: &str,
        projection: &Projection,
        shard: Shard,
        sink: &mut dyn RecordSink,
    ) -> Result<(), SourceError> {
        let mut row: u64 = 0;
        for day in 0..self.days {
            let date = self.anchor - Duration::days(i64::from(day));
            for product in 0..self.products {
                let idx = row;
                row += 1;
                if !shard.owns(idx) {
                    continue;
                }
                let mut rec = Record::new();
                if projection.contains("LicenseId") {
                    rec.insert("LicenseId", "license1");
                }
                if projection.contains("BilledProductId") {
                    rec.insert("BilledProductId", format!("product{product}"));
                }
                if projection.contains("Date") {
                    rec.insert("Date", date);
                }
                if projection.contains("Value") {
                    rec.insert("Value", self.value_for(idx));
                }
                sink.emit(rec)?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A fixed list of records, emitted in order.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    records: Vec<Record>,
}

impl StaticSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

impl From<Vec<Record>> for StaticSource {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl RecordSource for StaticSource {
    fn read(
        &self,
        _query: &str,
        _projection: &Projection,
        shard: Shard,
        sink: &mut dyn RecordSink,
    ) -> Result<(), SourceError> {
        for (i, rec) in self.records.iter().enumerate() {
            if shard.owns(i as u64) {
                sink.emit(rec.clone())?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "static"
    }
}
