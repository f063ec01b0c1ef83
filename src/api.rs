//! JSON request/response codec for an outer request layer.
//!
//! Inbound:
//!
//! ```json
//! {"groupBy": ["LicenseId"], "interval": "monthly", "aggregatedField": "Value", "query": ""}
//! ```
//!
//! Outbound, keyed by the rendered group-by list:
//!
//! ```json
//! {"groupby_[LicenseId]": [{"dataKey": "2024-03", "license1": 42}]}
//! ```

use crate::error::AggregateError;
use crate::flatten::ResultRow;
use crate::pipeline::Pipeline;
use crate::request::AggregationRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Status answered for a request body that cannot be decoded.
pub const MALFORMED_STATUS: u16 = 204;

/// Every field may be absent or `null`; both read as the zero value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireRequest {
    group_by: Option<Vec<String>>,
    interval: Option<String>,
    aggregated_field: Option<String>,
    query: Option<String>,
}

#[derive(Serialize)]
struct WireError<'a> {
    error: &'a str,
    message: String,
}

/// Decode a request body.
///
/// A missing, `null` or empty `aggregatedField` selects counting mode;
/// `interval` is matched case-insensitively and may be empty.
///
/// # Errors
/// [`AggregateError::BadRequest`] for invalid JSON or an unknown interval.
pub fn decode_request(body: &[u8]) -> Result<AggregationRequest, AggregateError> {
    let wire: WireRequest =
        serde_json::from_slice(body).map_err(|e| AggregateError::BadRequest(e.to_string()))?;
    let interval = wire.interval.unwrap_or_default().parse()?;
    let aggregated_field = wire.aggregated_field.filter(|f| !f.is_empty());
    Ok(AggregationRequest {
        group_by: wire.group_by.unwrap_or_default(),
        interval,
        aggregated_field,
        query: wire.query.unwrap_or_default(),
    })
}

/// The top-level response key for a group-by list, e.g. `groupby_[a b]`.
pub fn response_key(group_by: &[String]) -> String {
    format!("groupby_[{}]", group_by.join(" "))
}

/// # Errors
/// [`AggregateError::Encode`] if serialization fails.
pub fn encode_response(group_by: &[String], rows: &[ResultRow]) -> Result<Vec<u8>, AggregateError> {
    let mut doc = BTreeMap::new();
    doc.insert(response_key(group_by), rows);
    Ok(serde_json::to_vec(&doc)?)
}

/// Status and body to send back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }

    fn error(err: &AggregateError) -> Self {
        let body = serde_json::to_vec(&WireError {
            error: err.kind(),
            message: err.to_string(),
        })
        .unwrap_or_default();
        Self {
            status: err.status_code(),
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Decode `body`, run it on `pipeline` and encode the outcome.
pub fn handle(pipeline: &Pipeline, body: &[u8]) -> Response {
    let request = match decode_request(body) {
        Ok(r) => r,
        Err(err) => {
            warn!(error = %err, "rejecting request");
            return Response::empty(MALFORMED_STATUS);
        }
    };
    let group_by = request.group_by.clone();

    let rows = match pipeline.run(request) {
        Ok(rows) => rows,
        Err(err) => return Response::error(&err),
    };
    match encode_response(&group_by, &rows) {
        Ok(body) => Response { status: 200, body },
        Err(err) => Response::error(&err),
    }
}
