//! File and database record sources.
//!
//! - [`csv::DelimitedFileSource`]: header-keyed delimited files, one path or a glob,
//!   optionally compressed (feature `io-csv`).
//! - [`sql::SqlSource`]: PostgreSQL query results (feature `io-sql`).

pub mod compression;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod glob;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;

#[cfg_attr(docsrs, doc(cfg(feature = "io-sql")))]
#[cfg(feature = "io-sql")]
pub mod sql;
