use crate::bucket::TimeField;
use crate::error::AggregateError;
use crate::key::{GroupKey, KeyBuilder};
use crate::record::{Record, Value};
use crate::request::AggregationRequest;

/// Projects a record into its `(GroupKey, contribution)` pair.
#[derive(Clone, Debug)]
pub struct Mapper {
    keys: KeyBuilder,
    aggregated_field: Option<String>,
}

impl Mapper {
    pub fn new(request: &AggregationRequest, time_field: &TimeField) -> Self {
        Self {
            keys: KeyBuilder::for_request(request, time_field),
            aggregated_field: request.aggregated_field.clone(),
        }
    }

    /// Map one record.
    ///
    /// Counting mode contributes `1`. Otherwise integers are used as-is and
    /// text is parsed as a base-10 integer.
    ///
    /// # Errors
    /// [`AggregateError::DateParse`] from key building, or
    /// [`AggregateError::TypeCoercion`] when the aggregated field is absent or
    /// not an integer.
    pub fn map(&self, record: &Record) -> Result<(GroupKey, i64), AggregateError> {
        let key = self.keys.build(record)?;
        let Some(field) = &self.aggregated_field else {
            return Ok((key, 1));
        };
        let value = match record.get(field) {
            Some(Value::Int(v)) => *v,
            Some(Value::Text(text)) => text.trim().parse::<i64>().map_err(|_| {
                AggregateError::TypeCoercion {
                    field: field.clone(),
                    value: format!("{text:?}"),
                }
            })?,
            Some(other) => {
                return Err(AggregateError::TypeCoercion {
                    field: field.clone(),
                    value: format!("{other} ({})", other.type_name()),
                });
            }
            None => {
                return Err(AggregateError::TypeCoercion {
                    field: field.clone(),
                    value: "<missing>".to_string(),
                });
            }
        };
        Ok((key, value))
    }
}
