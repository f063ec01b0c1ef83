//! Testing utilities for aggregation pipelines.
//!
//! - **Assertions**: compare result rows ignoring order, check row invariants
//! - **Fixtures**: the license usage records the scenarios are built from
//! - **Mock I/O**: temporary files and delimited-file fixtures
//!
//! # Quick Start
//!
//! ```no_run
//! use groupflow::testing::*;
//! use groupflow::{AggregationRequest, Interval, Pipeline};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), groupflow::AggregateError> {
//! let pipeline = Pipeline::new(Arc::new(license_source()));
//! let rows = pipeline.run(AggregationRequest::new(["LicenseId"], Interval::Daily).sum_of("Value"))?;
//!
//! assert_unique_data_keys(&rows);
//! assert_row_value(&rows, "2024-03-01", "license1", 2);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_io;

pub use assertions::*;
pub use fixtures::*;
pub use mock_io::*;
