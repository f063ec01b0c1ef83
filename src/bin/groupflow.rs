use anyhow::{Context, Result, bail};
use clap::Parser;
use groupflow::{EngineConfig, Pipeline, PipelineMetrics, logging};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Answer one aggregation request against the configured record source
#[derive(Parser, Debug)]
#[command(name = "groupflow", version)]
#[command(about = "Group-by aggregation over mock, CSV or SQL records", long_about = None)]
struct Cli {
    /// YAML config file; when given, the source flags below are ignored
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of source shards read in parallel
    #[arg(long, default_value_t = 1)]
    shard: usize,

    /// Number of reduce lanes
    #[arg(long, default_value_t = 2)]
    partition: usize,

    /// Name of the date field
    #[arg(long, default_value = "Date")]
    datekey: String,

    /// strftime format of text dates, or "rfc3339"
    #[arg(long, default_value = "%Y-%m-%d")]
    datefmt: String,

    /// Record source: mock, csv or sql
    #[arg(long, default_value = "mock")]
    source: String,

    /// CSV file or glob pattern
    #[arg(long)]
    csv: Option<String>,

    #[arg(long, default_value = "localhost")]
    sql_host: String,

    #[arg(long, default_value_t = 5432)]
    sql_port: u16,

    #[arg(long, default_value = "postgres")]
    sql_username: String,

    #[arg(long, default_value = "")]
    sql_password: String,

    #[arg(long, default_value = "postgres")]
    sql_database: String,

    /// Request JSON file, or "-" for stdin
    #[arg(short, long, default_value = "-")]
    request: String,

    /// Write run metrics as JSON to this path
    #[arg(long)]
    metrics: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig> {
        if let Some(path) = &self.config {
            return EngineConfig::from_yaml_file(path);
        }
        let mut cfg = EngineConfig {
            shard: self.shard,
            partition: self.partition,
            date_field: self.datekey.clone(),
            date_format: self.datefmt.clone(),
            source: self.source.clone(),
            ..EngineConfig::default()
        };
        cfg.csv.path = self.csv.clone();
        cfg.sql.host = self.sql_host.clone();
        cfg.sql.port = self.sql_port;
        cfg.sql.username = self.sql_username.clone();
        cfg.sql.password = self.sql_password.clone();
        cfg.sql.database = self.sql_database.clone();
        Ok(cfg)
    }

    fn read_request(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        if self.request == "-" {
            std::io::stdin()
                .read_to_end(&mut body)
                .context("read request from stdin")?;
        } else {
            body = std::fs::read(&self.request)
                .with_context(|| format!("read request {}", self.request))?;
        }
        Ok(body)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    logging::init(level)?;
    debug!(?cli, "parsed arguments");

    let config = cli.engine_config()?;
    let mut pipeline = Pipeline::from_config(&config).context("configure pipeline")?;
    let metrics = cli.metrics.as_ref().map(|_| PipelineMetrics::new());
    if let Some(m) = &metrics {
        pipeline = pipeline.with_metrics(Arc::clone(m));
    }
    info!(source = %config.source, shard = config.shard, partition = config.partition, "pipeline ready");

    let body = cli.read_request()?;
    let response = groupflow::handle(&pipeline, &body);

    if let (Some(path), Some(m)) = (&cli.metrics, &metrics) {
        m.save_to_file(path)?;
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&response.body)?;
    if !response.body.is_empty() {
        writeln!(stdout)?;
    }

    if !response.is_success() {
        bail!("request failed with status {}", response.status);
    }
    Ok(())
}
