//! Delimited-file source: headers, projection, sharding, globs and compression.

#![cfg(feature = "io-csv")]

use groupflow::io::compression::CompressionCodec;
use groupflow::testing::*;
use groupflow::*;
use std::io::Read;
use std::sync::Arc;

fn read_all(source: &DelimitedFileSource, projection: &Projection, shard: Shard) -> Vec<Record> {
    let mut sink = VecSink::default();
    source.read("", projection, shard, &mut sink).unwrap();
    sink.records
}

#[test]
fn rows_are_keyed_by_header_as_text() -> anyhow::Result<()> {
    let file = write_temp_csv(LICENSE_CSV)?;
    let records = read_all(&DelimitedFileSource::new(file.path_str()), &Projection::all(), Shard::whole());

    assert_eq!(records.len(), 5);
    assert_eq!(records[0].get("LicenseId"), Some(&Value::from("license1")));
    assert_eq!(records[0].get("Value"), Some(&Value::Text("2".into())));
    assert_eq!(records[4].get("Date"), Some(&Value::from("2024-03-05")));
    Ok(())
}

#[test]
fn projection_drops_unneeded_columns() -> anyhow::Result<()> {
    let file = write_temp_csv(LICENSE_CSV)?;
    let projection: Projection = ["LicenseId", "Value"].into_iter().collect();
    let records = read_all(&DelimitedFileSource::new(file.path_str()), &projection, Shard::whole());
    assert!(records.iter().all(|r| r.len() == 2 && r.get("Date").is_none()));
    Ok(())
}

#[test]
fn shards_partition_the_rows() -> anyhow::Result<()> {
    let file = write_temp_csv(LICENSE_CSV)?;
    let source = DelimitedFileSource::new(file.path_str());
    let sizes: Vec<usize> = Shard::split(3)
        .map(|s| read_all(&source, &Projection::all(), s).len())
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    Ok(())
}

#[test]
fn short_rows_lack_trailing_fields() -> anyhow::Result<()> {
    let file = write_temp_csv("a,b,c\n1,2\n")?;
    let records = read_all(&DelimitedFileSource::new(file.path_str()), &Projection::all(), Shard::whole());
    assert_eq!(records[0].len(), 2);
    assert!(records[0].get("c").is_none());
    Ok(())
}

#[test]
fn scenarios_run_over_a_csv_file() -> anyhow::Result<()> {
    let file = write_temp_csv(LICENSE_CSV)?;
    let pipeline = Pipeline::new(Arc::new(DelimitedFileSource::new(file.path_str())))
        .with_runner(Runner::parallel(2, 2));

    let rows = pipeline.run(
        AggregationRequest::new(["LicenseId", "BilledProductId"], Interval::Monthly).sum_of("Value"),
    )?;
    assert_eq!(rows, vec![row("2024-03", [("license1,product1", 10)])]);
    Ok(())
}

#[test]
fn custom_delimiter() -> anyhow::Result<()> {
    let file = write_temp_csv(&LICENSE_CSV.replace(',', ";"))?;
    let source = DelimitedFileSource::new(file.path_str()).with_delimiter(b';');
    let rows = Pipeline::new(Arc::new(source))
        .run(AggregationRequest::new(["LicenseId"], Interval::Yearly).sum_of("Value"))?;
    assert_eq!(rows, vec![row("2024", [("license1", 10)])]);
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_files_are_decompressed() -> anyhow::Result<()> {
    let file = write_temp_csv_gz(LICENSE_CSV)?;
    let rows = Pipeline::new(Arc::new(DelimitedFileSource::new(file.path_str())))
        .run(AggregationRequest::new(["LicenseId"], Interval::Daily))?;
    assert_eq!(rows.len(), 5);
    assert_row_value(&rows, "2024-03-03", "license1", 1);
    Ok(())
}

#[test]
fn glob_reads_every_matching_file() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    dir.write_file("usage-1.csv", "LicenseId,Date,Value\nl1,2024-01-01,5\nl2,2024-01-02,6\n")?;
    dir.write_file("usage-2.csv", "LicenseId,Date,Value\nl1,2024-02-01,7\n")?;
    dir.write_file("notes.txt", "ignored")?;

    let pattern = dir.file_path("usage-*.csv").display().to_string();
    let source = DelimitedFileSource::new(pattern);
    assert_eq!(source.files()?.len(), 2);

    let rows = Pipeline::new(Arc::new(source))
        .with_runner(Runner::parallel(2, 3))
        .run(AggregationRequest::new(["LicenseId"], Interval::Monthly).sum_of("Value"))?;
    assert_rows_unordered_equal(
        &rows,
        &[row("2024-01", [("l1", 5), ("l2", 6)]), row("2024-02", [("l1", 7)])],
    );
    Ok(())
}

#[test]
fn missing_file_is_a_source_error() {
    let source = DelimitedFileSource::new("/definitely/not/here.csv");
    let err = Pipeline::new(Arc::new(source))
        .run(AggregationRequest::new(["LicenseId"], Interval::None))
        .unwrap_err();
    assert!(matches!(err, AggregateError::Source(SourceError::Io { .. })), "{err}");
}

#[test]
fn pattern_is_kept_verbatim() {
    let source = DelimitedFileSource::new("data/usage-*.csv.gz").with_delimiter(b'|');
    assert_eq!(source.pattern(), "data/usage-*.csv.gz");
}

const XOR_KEY: u8 = 0x5A;

/// Toy codec: every byte XOR-ed with a fixed key, selected by the `.xor` extension.
struct XorCodec;

struct XorReader(Box<dyn Read>);

impl Read for XorReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.0.read(buf)?;
        for b in &mut buf[..n] {
            *b ^= XOR_KEY;
        }
        Ok(n)
    }
}

impl CompressionCodec for XorCodec {
    fn name(&self) -> &str {
        "xor"
    }

    fn extensions(&self) -> &[&str] {
        &[".xor"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        None
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(XorReader(reader)))
    }
}

#[test]
fn registered_codec_decodes_its_extension() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("usage.csv.xor");
    let encoded: Vec<u8> = LICENSE_CSV.bytes().map(|b| b ^ XOR_KEY).collect();
    std::fs::write(&path, encoded)?;

    let source = DelimitedFileSource::new(path.display().to_string()).with_codec(Arc::new(XorCodec));
    let rows = Pipeline::new(Arc::new(source))
        .run(AggregationRequest::new(["LicenseId"], Interval::Yearly).sum_of("Value"))?;
    assert_eq!(rows, vec![row("2024", [("license1", 10)])]);
    Ok(())
}
