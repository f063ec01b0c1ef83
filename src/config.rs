//! Engine configuration, loaded from YAML or assembled by the CLI.
//!
//! Every key is optional:
//!
//! ```yaml
//! shard: 2
//! partition: 8
//! queueCapacity: 1024
//! dateField: Date
//! dateFormat: "%Y-%m-%d"
//! source: csv            # mock | csv | sql
//! recordPolicy: failFast # failFast | skipInvalid
//! csv:
//!   path: "data/usage-*.csv.gz"
//!   delimiter: ","
//! ```

use crate::bucket::TimeField;
use crate::error::AggregateError;
use crate::runner::{DEFAULT_QUEUE_CAPACITY, ExecMode, Runner};
use crate::source::{MockSource, RecordSource};
use crate::validation::RecordPolicy;
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Source shards read in parallel.
    pub shard: usize,
    /// Reduce lanes.
    pub partition: usize,
    pub queue_capacity: usize,
    pub date_field: String,
    pub date_format: String,
    /// `mock`, `csv` or `sql`.
    pub source: String,
    pub record_policy: RecordPolicy,
    pub csv: CsvConfig,
    pub sql: SqlConfig,
    pub mock: MockConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let time = TimeField::default();
        Self {
            shard: 1,
            partition: 2,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            date_field: time.name,
            date_format: time.format,
            source: "mock".to_string(),
            record_policy: RecordPolicy::default(),
            csv: CsvConfig::default(),
            sql: SqlConfig::default(),
            mock: MockConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub path: Option<String>,
    pub delimiter: char,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: ',',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub days: u32,
    pub products: u32,
    pub seed: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            days: 365,
            products: 2,
            seed: None,
        }
    }
}

fn config_err(msg: impl Into<String>) -> AggregateError {
    AggregateError::Configuration(msg.into())
}

impl EngineConfig {
    /// # Errors
    /// [`AggregateError::Configuration`] if the text is not a valid config document.
    pub fn from_yaml_str(text: &str) -> Result<Self, AggregateError> {
        // An empty document means "all defaults".
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| config_err(format!("invalid config: {e}")))
    }

    /// Read and parse a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// # Errors
    /// [`AggregateError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> Result<(), AggregateError> {
        if self.shard == 0 {
            return Err(config_err("shard must be at least 1"));
        }
        if self.partition == 0 {
            return Err(config_err("partition must be at least 1"));
        }
        if self.queue_capacity == 0 {
            return Err(config_err("queueCapacity must be at least 1"));
        }
        if self.date_field.is_empty() {
            return Err(config_err("dateField must not be empty"));
        }
        if self.date_format.is_empty() {
            return Err(config_err("dateFormat must not be empty"));
        }
        match self.source.as_str() {
            "mock" | "sql" => Ok(()),
            "csv" => {
                if self.csv.path.as_deref().is_none_or(str::is_empty) {
                    return Err(config_err("source `csv` requires csv.path"));
                }
                if !self.csv.delimiter.is_ascii() {
                    return Err(config_err(format!(
                        "csv.delimiter `{}` is not a single-byte character",
                        self.csv.delimiter
                    )));
                }
                Ok(())
            }
            other => Err(config_err(format!("unknown source `{other}`"))),
        }
    }

    pub fn time_field(&self) -> TimeField {
        TimeField::new(self.date_field.clone(), self.date_format.clone())
    }

    pub fn runner(&self) -> Runner {
        Runner {
            mode: ExecMode::Parallel {
                shards: Some(self.shard),
                partitions: Some(self.partition),
            },
            queue_capacity: self.queue_capacity,
            policy: self.record_policy,
            ..Runner::default()
        }
    }

    /// Instantiate the configured record source.
    ///
    /// # Errors
    /// [`AggregateError::Configuration`] for an unknown selector, a missing
    /// CSV file, or a backend not compiled into this build.
    pub fn build_source(&self) -> Result<Arc<dyn RecordSource>, AggregateError> {
        match self.source.as_str() {
            "mock" => Ok(Arc::new(MockSource {
                days: self.mock.days,
                products: self.mock.products,
                anchor: Utc::now(),
                seed: self.mock.seed,
            })),
            "csv" => self.build_csv(),
            "sql" => self.build_sql(),
            other => Err(config_err(format!("unknown source `{other}`"))),
        }
    }

    #[cfg(feature = "io-csv")]
    fn build_csv(&self) -> Result<Arc<dyn RecordSource>, AggregateError> {
        use crate::io::csv::DelimitedFileSource;
        use crate::io::glob::is_pattern;

        let path = self
            .csv
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| config_err("source `csv` requires csv.path"))?;
        if !is_pattern(path) && !Path::new(path).is_file() {
            return Err(config_err(format!("csv file `{path}` does not exist")));
        }
        let delimiter = u8::try_from(self.csv.delimiter)
            .map_err(|_| config_err(format!("csv.delimiter `{}` is not a single byte", self.csv.delimiter)))?;
        Ok(Arc::new(DelimitedFileSource::new(path).with_delimiter(delimiter)))
    }

    #[cfg(not(feature = "io-csv"))]
    fn build_csv(&self) -> Result<Arc<dyn RecordSource>, AggregateError> {
        Err(config_err("source `csv` requires the `io-csv` feature"))
    }

    #[cfg(feature = "io-sql")]
    fn build_sql(&self) -> Result<Arc<dyn RecordSource>, AggregateError> {
        use crate::io::sql::SqlSource;

        Ok(Arc::new(SqlSource {
            host: self.sql.host.clone(),
            port: self.sql.port,
            username: self.sql.username.clone(),
            password: self.sql.password.clone(),
            database: self.sql.database.clone(),
        }))
    }

    #[cfg(not(feature = "io-sql"))]
    fn build_sql(&self) -> Result<Arc<dyn RecordSource>, AggregateError> {
        Err(config_err("source `sql` requires the `io-sql` feature"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::from_yaml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn camel_case_keys() {
        let cfg = EngineConfig::from_yaml_str(
            "shard: 3\npartition: 5\ndateField: day\ndateFormat: rfc3339\nrecordPolicy: skipInvalid\n",
        )
        .unwrap();
        assert_eq!(cfg.shard, 3);
        assert_eq!(cfg.partition, 5);
        assert_eq!(cfg.time_field(), TimeField::new("day", "rfc3339"));
        assert_eq!(cfg.record_policy, RecordPolicy::SkipInvalid);
        assert_eq!(cfg.source, "mock");
    }

    #[test]
    fn zero_partition_rejected() {
        let cfg = EngineConfig {
            partition: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AggregateError::Configuration(_))));
    }
}
