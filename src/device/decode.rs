use serde_json::Value;

use crate::device::types::Reading;
use crate::error::DecodeError;

/// Decodes a text frame such as `{"distance": 3.2}`.
///
/// Any JSON number is accepted as the distance, including negative ones. Other fields are ignored.
pub fn decode_reading(text: &str) -> Result<Reading, DecodeError> {
    let value: Value = serde_json::from_str(text)?;

    value.get("distance")
        .and_then(Value::as_f64)
        .map(|distance| Reading { distance })
        .ok_or(DecodeError::MissingDistance)
}
