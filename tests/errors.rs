//! Fatal errors end the run, never the process, and leave the pipeline usable.

use groupflow::testing::*;
use groupflow::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Emits a few rows, then fails the read.
struct BrokenSource {
    calls: AtomicUsize,
    fail_first_only: bool,
}

impl BrokenSource {
    fn new(fail_first_only: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_first_only,
        }
    }
}

impl RecordSource for BrokenSource {
    fn read(
        &self,
        query: &str,
        projection: &Projection,
        shard: Shard,
        sink: &mut dyn RecordSink,
    ) -> Result<(), SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        license_source().read(query, projection, shard, sink)?;
        if call == 0 || !self.fail_first_only {
            return Err(SourceError::Query("connection reset".into()));
        }
        Ok(())
    }
}

fn both_modes() -> [Runner; 2] {
    [Runner::sequential(), Runner::parallel(2, 4)]
}

#[test]
fn non_numeric_aggregated_field_fails_the_run() {
    logging::init_for_tests();
    let mut records = license_records();
    records[3].insert("Value", "n/a");
    for runner in both_modes() {
        let err = Pipeline::new(Arc::new(StaticSource::new(records.clone())))
            .with_runner(runner)
            .run(AggregationRequest::new(["LicenseId"], Interval::Daily).sum_of("Value"))
            .unwrap_err();
        assert!(matches!(err, AggregateError::TypeCoercion { ref field, .. } if field == "Value"), "{err}");
        assert_eq!(err.status_code(), 422);
    }
}

#[test]
fn missing_aggregated_field_fails_the_run() {
    let err = Pipeline::new(Arc::new(license_source()))
        .with_runner(Runner::sequential())
        .run(AggregationRequest::new(["LicenseId"], Interval::Daily).sum_of("Cost"))
        .unwrap_err();
    assert!(matches!(err, AggregateError::TypeCoercion { .. }));
}

#[test]
fn unparseable_date_fails_the_run() {
    let mut records = license_records();
    records[0].insert("Date", "03/01/2024");
    for runner in both_modes() {
        let err = Pipeline::new(Arc::new(StaticSource::new(records.clone())))
            .with_runner(runner)
            .run(AggregationRequest::new(["LicenseId"], Interval::Monthly))
            .unwrap_err();
        assert!(matches!(err, AggregateError::DateParse { .. }), "{err}");
    }
}

#[test]
fn integer_date_is_a_date_error() {
    let records = vec![Record::new().with("LicenseId", "l").with("Date", 20240301i64)];
    let err = Pipeline::new(Arc::new(StaticSource::new(records)))
        .run(AggregationRequest::new(["LicenseId"], Interval::Daily))
        .unwrap_err();
    assert!(matches!(err, AggregateError::DateParse { .. }));
}

#[test]
fn missing_date_is_ignored_without_bucketing() -> anyhow::Result<()> {
    let records = vec![Record::new().with("LicenseId", "l")];
    let rows = Pipeline::new(Arc::new(StaticSource::new(records)))
        .run(AggregationRequest::new(["LicenseId"], Interval::None))?;
    assert_row_value(&rows, "", "l", 1);
    Ok(())
}

#[test]
fn skip_invalid_drops_bad_records() -> anyhow::Result<()> {
    let mut records = license_records();
    records[1].insert("Value", "two");
    records[2].insert("Date", "yesterday");
    for runner in both_modes() {
        let metrics = PipelineMetrics::new();
        let rows = Pipeline::new(Arc::new(StaticSource::new(records.clone())))
            .with_runner(runner)
            .with_policy(RecordPolicy::SkipInvalid)
            .with_metrics(Arc::clone(&metrics))
            .run(AggregationRequest::new(["LicenseId"], Interval::Monthly).sum_of("Value"))?;
        assert_eq!(rows, vec![row("2024-03", [("license1", 6)])]);
        assert_eq!(metrics.records_skipped(), 2);
        assert_eq!(metrics.records_read(), 5);
    }
    Ok(())
}

#[test]
fn source_failure_fails_only_that_run() -> anyhow::Result<()> {
    for runner in both_modes() {
        let pipeline = Pipeline::new(Arc::new(BrokenSource::new(true))).with_runner(runner);
        let request = AggregationRequest::new(["LicenseId"], Interval::Monthly).sum_of("Value");

        let err = pipeline.run(request.clone()).unwrap_err();
        assert!(matches!(err, AggregateError::Source(SourceError::Query(_))), "{err}");
        assert_eq!(err.status_code(), 502);

        // Later reads succeed; the pipeline itself is unaffected.
        let rows = pipeline.run(request)?;
        assert!(!rows.is_empty());
        assert_eq!(rows_total(&rows) % 10, 0);
    }
    Ok(())
}

#[test]
fn failed_run_counts_in_metrics() {
    let metrics = PipelineMetrics::new();
    let pipeline = Pipeline::new(Arc::new(BrokenSource::new(false)))
        .with_runner(Runner::parallel(3, 2))
        .with_metrics(Arc::clone(&metrics));
    assert!(pipeline.run(AggregationRequest::new(["LicenseId"], Interval::Daily)).is_err());
    assert_eq!(metrics.runs(), 1);
    assert_eq!(metrics.failed_runs(), 1);
    assert_eq!(metrics.rows_emitted(), 0);
}

/// Panics inside `read`.
struct PanickingSource(AtomicBool);

impl RecordSource for PanickingSource {
    fn read(&self, _: &str, _: &Projection, _: Shard, _: &mut dyn RecordSink) -> Result<(), SourceError> {
        self.0.store(true, Ordering::SeqCst);
        panic!("driver bug");
    }
}

#[test]
fn panicking_source_surfaces_as_error() {
    let source = Arc::new(PanickingSource(AtomicBool::new(false)));
    let err = Pipeline::new(Arc::clone(&source) as Arc<dyn RecordSource>)
        .with_runner(Runner::parallel(2, 2))
        .run(AggregationRequest::new(["LicenseId"], Interval::None))
        .unwrap_err();
    assert!(matches!(err, AggregateError::WorkerPanicked(ref msg) if msg.contains("driver bug")), "{err}");
    assert!(source.0.load(Ordering::SeqCst));
}

#[test]
fn a_large_failing_run_does_not_hang() {
    let mut records = usage_records(20_000);
    records[10_000].insert("Value", "bad");
    let runner = Runner {
        queue_capacity: 4,
        ..Runner::parallel(4, 8)
    };
    let err = Pipeline::new(Arc::new(StaticSource::new(records)))
        .with_runner(runner)
        .run(AggregationRequest::new(["LicenseId"], Interval::Daily).sum_of("Value"))
        .unwrap_err();
    assert!(err.is_record_level());
}

#[test]
fn sum_overflow_fails_the_run() {
    let records = vec![
        Record::new().with("k", "a").with("Value", i64::MAX),
        Record::new().with("k", "a").with("Value", 1i64),
    ];
    for runner in both_modes() {
        let err = Pipeline::new(Arc::new(StaticSource::new(records.clone())))
            .with_runner(runner)
            .run(AggregationRequest::new(["k"], Interval::None).sum_of("Value"))
            .unwrap_err();
        assert!(matches!(err, AggregateError::Overflow { ref key } if key == "a"), "{err}");
        assert_eq!(err.status_code(), 422);
        assert!(!err.is_record_level());
    }
}

#[test]
fn in_range_total_survives_any_arrival_order() -> anyhow::Result<()> {
    let records = vec![
        Record::new().with("k", "a").with("Value", i64::MAX),
        Record::new().with("k", "a").with("Value", 1i64),
        Record::new().with("k", "a").with("Value", -5i64),
    ];
    for runner in both_modes() {
        let rows = Pipeline::new(Arc::new(StaticSource::new(records.clone())))
            .with_runner(runner)
            .run(AggregationRequest::new(["k"], Interval::None).sum_of("Value"))?;
        assert_row_value(&rows, "", "a", i64::MAX - 4);
    }
    Ok(())
}

#[test]
fn data_key_group_is_a_reserved_column_error() {
    let records = vec![Record::new().with("k", "dataKey").with("Date", "2024-03-01")];
    for runner in both_modes() {
        let err = Pipeline::new(Arc::new(StaticSource::new(records.clone())))
            .with_runner(runner)
            .run(AggregationRequest::new(["k"], Interval::Monthly))
            .unwrap_err();
        assert!(matches!(err, AggregateError::ReservedColumn { ref column } if column == "dataKey"), "{err}");
        assert_eq!(err.status_code(), 422);
    }
}

#[test]
fn empty_group_value_next_to_literal_total_is_rejected() {
    let records = vec![
        Record::new().with("k", ""),
        Record::new().with("k", "total"),
    ];
    let err = Pipeline::new(Arc::new(StaticSource::new(records)))
        .with_runner(Runner::sequential())
        .run(AggregationRequest::new(["k"], Interval::None))
        .unwrap_err();
    assert!(matches!(err, AggregateError::ReservedColumn { ref column } if column == TOTAL_COLUMN), "{err}");
}
