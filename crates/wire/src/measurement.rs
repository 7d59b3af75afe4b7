//! Numeric vitals as the backend sends them.
//!
//! Decimal model fields arrive either as JSON numbers or as strings such as `"170.50"`.
//! A zero, blank or null value means the measurement was not captured.

use crate::{WireError, WireResult};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum Measurement {
    Number(f64),
    Text(String),
}

impl Measurement {
    /// Decimal reading; `Ok(None)` for blank or zero.
    pub(crate) fn decimal(value: Option<Measurement>, field: &str) -> WireResult<Option<f64>> {
        let parsed = match value {
            None => return Ok(None),
            Some(Measurement::Number(n)) => n,
            Some(Measurement::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                text.parse::<f64>().map_err(|_| {
                    WireError::Translation(format!("{field} is not a number: {text:?}"))
                })?
            }
        };

        if !parsed.is_finite() || parsed < 0.0 {
            return Err(WireError::Translation(format!(
                "{field} is out of range: {parsed}"
            )));
        }
        Ok((parsed != 0.0).then_some(parsed))
    }

    /// Whole-number reading (rounded); `Ok(None)` for blank or zero.
    pub(crate) fn count(value: Option<Measurement>, field: &str) -> WireResult<Option<u32>> {
        let Some(decimal) = Self::decimal(value, field)? else {
            return Ok(None);
        };
        let rounded = decimal.round();
        if rounded > f64::from(u32::MAX) {
            return Err(WireError::Translation(format!(
                "{field} is out of range: {decimal}"
            )));
        }
        Ok(Some(rounded as u32))
    }
}
