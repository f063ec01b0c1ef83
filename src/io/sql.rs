//! PostgreSQL record source (feature `io-sql`).
//!
//! The request's `query` is executed verbatim. Each result row becomes a
//! [`Record`] keyed by column name: integer columns map to `Int`, timestamp and
//! date columns to `Timestamp`, everything else is decoded as text. SQL `NULL`
//! leaves the field absent.
//!
//! Sharding is row-count based over the result order, like the file source, so
//! the query should carry an `ORDER BY` when more than one shard is used.

use crate::error::SourceError;
use crate::record::{Record, Value};
use crate::request::Projection;
use crate::source::{RecordSink, RecordSource, Shard};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, ConnectOptions, Row, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct SqlSource {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl Default for SqlSource {
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

impl SqlSource {
    fn options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }

    async fn stream(
        &self,
        query: &str,
        projection: &Projection,
        shard: Shard,
        sink: &mut dyn RecordSink,
    ) -> Result<(), SourceError> {
        let connect = self.options().connect();
        let mut conn = tokio::time::timeout(CONNECT_TIMEOUT, connect)
            .await
            .map_err(|_| SourceError::Query(format!("connect to {}:{} timed out", self.host, self.port)))?
            .map_err(query_err)?;

        let mut rows = sqlx::query(query).fetch(&mut conn);
        let mut idx: u64 = 0;
        while let Some(row) = rows.try_next().await.map_err(query_err)? {
            let owned = shard.owns(idx);
            idx += 1;
            if owned {
                sink.emit(decode_row(&row, projection)?)?;
            }
        }
        debug!(rows = idx, %shard, "sql query drained");
        Ok(())
    }
}

fn query_err(e: sqlx::Error) -> SourceError {
    SourceError::Query(e.to_string())
}

fn decode_row(row: &PgRow, projection: &Projection) -> Result<Record, SourceError> {
    let mut rec = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name();
        if !projection.contains(name) {
            continue;
        }
        if row.try_get_raw(i).map_err(query_err)?.is_null() {
            continue;
        }
        let value = match column.type_info().name() {
            "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(i).map_err(query_err)?)),
            "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(i).map_err(query_err)?)),
            "INT8" => Value::Int(row.try_get::<i64, _>(i).map_err(query_err)?),
            "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(i).map_err(query_err)?),
            "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(i).map_err(query_err)?.and_utc()),
            "DATE" => {
                let day = row.try_get::<NaiveDate, _>(i).map_err(query_err)?;
                Value::Timestamp(day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
            }
            _ => Value::Text(row.try_get::<String, _>(i).map_err(query_err)?),
        };
        rec.insert(name, value);
    }
    Ok(rec)
}

impl RecordSource for SqlSource {
    fn read(
        &self,
        query: &str,
        projection: &Projection,
        shard: Shard,
        sink: &mut dyn RecordSink,
    ) -> Result<(), SourceError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| SourceError::Io {
                path: format!("{}:{}", self.host, self.port),
                source,
            })?;
        rt.block_on(self.stream(query, projection, shard, sink))
    }

    fn name(&self) -> &str {
        "sql"
    }
}
