//! Run lifecycle, handles and metrics.

use groupflow::testing::*;
use groupflow::*;
use std::sync::{Arc, Barrier};
use std::thread;

/// Blocks inside `read` until the test releases it.
struct GatedSource {
    gate: Arc<Barrier>,
}

impl RecordSource for GatedSource {
    fn read(
        &self,
        query: &str,
        projection: &Projection,
        shard: Shard,
        sink: &mut dyn RecordSink,
    ) -> Result<(), SourceError> {
        self.gate.wait();
        license_source().read(query, projection, shard, sink)
    }
}

#[test]
fn handle_reports_completed_after_collect() -> anyhow::Result<()> {
    logging::init_for_tests();
    let gate = Arc::new(Barrier::new(2));
    let pipeline = Pipeline::new(Arc::new(GatedSource {
        gate: Arc::clone(&gate),
    }))
    .with_runner(Runner::sequential());

    let handle = pipeline.start(AggregationRequest::new(["LicenseId"], Interval::Monthly));
    // The source is parked on the gate, so the run cannot have completed yet.
    assert_ne!(handle.state(), PipelineState::Completed);
    gate.wait();

    let rows = handle.collect()?;
    assert_eq!(rows, vec![row("2024-03", [("license1", 5)])]);
    Ok(())
}

#[test]
fn state_reaches_completed_without_collecting() {
    let pipeline = Pipeline::new(Arc::new(license_source()));
    let handle = pipeline.start(AggregationRequest::new(["LicenseId"], Interval::Daily));
    while handle.state() != PipelineState::Completed {
        thread::yield_now();
    }
    handle.close();
}

#[test]
fn dropping_a_handle_releases_the_run() {
    let metrics = PipelineMetrics::new();
    let pipeline = Pipeline::new(Arc::new(license_source())).with_metrics(Arc::clone(&metrics));
    drop(pipeline.start(AggregationRequest::new(["LicenseId"], Interval::Daily)));
    // Drop joins the run thread, so the run has been accounted for.
    assert_eq!(metrics.runs(), 1);
}

#[test]
fn concurrent_runs_are_independent() -> anyhow::Result<()> {
    let pipeline = Pipeline::new(Arc::new(StaticSource::new(usage_records(600))))
        .with_runner(Runner::parallel(2, 5));
    let daily = AggregationRequest::new(["LicenseId"], Interval::Daily).sum_of("Value");
    let yearly = AggregationRequest::new(["BilledProductId"], Interval::Yearly);

    let handles: Vec<_> = (0..4)
        .map(|i| pipeline.start(if i % 2 == 0 { daily.clone() } else { yearly.clone() }))
        .collect();
    let results = handles
        .into_iter()
        .map(PipelineHandle::collect)
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(results[0], results[2]);
    assert_eq!(results[1], results[3]);
    assert_eq!(rows_total(&results[1]), 600);
    Ok(())
}

#[test]
fn metrics_track_a_run() -> anyhow::Result<()> {
    let metrics = PipelineMetrics::new();
    let pipeline = Pipeline::new(Arc::new(license_source()))
        .with_runner(Runner::parallel(2, 3))
        .with_metrics(Arc::clone(&metrics));

    let rows = pipeline.run(AggregationRequest::new(["LicenseId", "BilledProductId"], Interval::Daily).sum_of("Value"))?;
    assert_eq!(rows.len(), 5);
    assert_eq!(metrics.runs(), 1);
    assert_eq!(metrics.failed_runs(), 0);
    assert_eq!(metrics.records_read(), 5);
    assert_eq!(metrics.pairs_routed(), 5);
    assert_eq!(metrics.distinct_keys(), 5);
    assert_eq!(metrics.rows_emitted(), 5);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot["records_read"], 5);
    assert_eq!(metrics.to_json()["rows_emitted"], 5);

    let out = TempFilePath::with_extension("json")?;
    metrics.save_to_file(out.path())?;
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(out.path())?)?;
    assert_eq!(saved["runs"], 1);

    metrics.reset();
    assert_eq!(metrics.records_read(), 0);
    Ok(())
}

#[test]
fn from_config_wires_the_runner() -> anyhow::Result<()> {
    let config = EngineConfig::from_yaml_str("shard: 3\npartition: 7\nqueueCapacity: 16\nmock:\n  days: 10\n  products: 2\n  seed: 1\n")?;
    let pipeline = Pipeline::from_config(&config)?;
    assert_eq!(pipeline.runner().shards(), 3);
    assert_eq!(pipeline.runner().partitions(), 7);
    assert_eq!(pipeline.runner().queue_capacity, 16);

    let rows = pipeline.run(AggregationRequest::new(["LicenseId"], Interval::None))?;
    assert_row_value(&rows, "", "license1", 20);
    Ok(())
}
