//! Vital-sign snapshots and their rendering.
//!
//! Every measurement is optional. An absent value renders as [`PLACEHOLDER`], never as
//! zero. BMI is taken from the snapshot when the source supplied one and is otherwise
//! derived from height and weight.

use crate::PLACEHOLDER;
use serde::{Deserialize, Serialize};

/// A patient's most recent measurements, as supplied by the vitals service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    /// Height in centimetres.
    pub height_cm: Option<f64>,
    /// Weight in kilograms.
    pub weight_kg: Option<f64>,
    /// Heart rate in beats per minute.
    pub heart_rate_bpm: Option<u32>,
    /// Blood pressure formatted `systolic/diastolic`.
    pub blood_pressure: Option<String>,
    /// Body temperature in degrees Celsius.
    pub temperature_c: Option<f64>,
    /// Oxygen saturation in percent.
    pub oxygen_saturation_pct: Option<u32>,
    /// BMI as supplied by the source, if any.
    pub bmi: Option<f64>,
}

impl VitalsSnapshot {
    /// Effective BMI: the supplied value wins; otherwise `weight / height_m²`.
    ///
    /// Returns `None` when no BMI was supplied and height is missing or non-positive, or
    /// weight is missing.
    pub fn effective_bmi(&self) -> Option<f64> {
        if let Some(bmi) = self.bmi {
            return Some(bmi);
        }
        derive_bmi(self.height_cm?, self.weight_kg?)
    }

    /// Renders every measurement with units, substituting the placeholder for gaps.
    pub fn display(&self) -> VitalsDisplay {
        VitalsDisplay {
            height: render(self.height_cm, |v| format!("{} cm", trim_float(v))),
            weight: render(self.weight_kg, |v| format!("{} kg", trim_float(v))),
            heart_rate: render(self.heart_rate_bpm, |v| format!("{v} bpm")),
            blood_pressure: self
                .blood_pressure
                .as_deref()
                .map(str::trim)
                .filter(|bp| !bp.is_empty())
                .map(str::to_owned)
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            temperature: render(self.temperature_c, |v| format!("{} °C", trim_float(v))),
            oxygen_saturation: render(self.oxygen_saturation_pct, |v| format!("{v}%")),
            bmi: render(self.effective_bmi(), |v| format!("{v:.1}")),
        }
    }
}

/// Computes BMI from height in centimetres and weight in kilograms.
pub fn derive_bmi(height_cm: f64, weight_kg: f64) -> Option<f64> {
    if !height_cm.is_finite() || !weight_kg.is_finite() || height_cm <= 0.0 {
        return None;
    }
    let metres = height_cm / 100.0;
    Some(weight_kg / (metres * metres))
}

/// Display-ready vitals, one string per column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VitalsDisplay {
    pub height: String,
    pub weight: String,
    pub heart_rate: String,
    pub blood_pressure: String,
    pub temperature: String,
    pub oxygen_saturation: String,
    pub bmi: String,
}

impl VitalsDisplay {
    /// `170 cm / 65 kg` style combined column.
    pub fn height_weight(&self) -> String {
        format!("{} / {}", self.height, self.weight)
    }
}

fn render<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map(f).unwrap_or_else(|| PLACEHOLDER.to_string())
}

// 170.0 -> "170", 36.85 -> "36.85"
fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> VitalsSnapshot {
        VitalsSnapshot {
            height_cm: Some(170.0),
            weight_kg: Some(65.0),
            heart_rate_bpm: Some(72),
            blood_pressure: Some("120/80".into()),
            temperature_c: Some(36.8),
            oxygen_saturation_pct: Some(98),
            bmi: None,
        }
    }

    #[test]
    fn test_bmi_is_derived_when_missing() {
        let bmi = full().effective_bmi().expect("derived bmi");
        assert!((bmi - 22.49).abs() < 0.01);
    }

    #[test]
    fn test_supplied_bmi_takes_precedence() {
        let vitals = VitalsSnapshot {
            bmi: Some(30.1),
            ..full()
        };
        assert_eq!(vitals.effective_bmi(), Some(30.1));
    }

    #[test]
    fn test_bmi_needs_positive_height() {
        let vitals = VitalsSnapshot {
            height_cm: Some(0.0),
            ..full()
        };
        assert_eq!(vitals.effective_bmi(), None);

        let vitals = VitalsSnapshot {
            weight_kg: None,
            ..full()
        };
        assert_eq!(vitals.effective_bmi(), None);
    }

    #[test]
    fn test_display_renders_units() {
        let shown = full().display();
        assert_eq!(shown.height, "170 cm");
        assert_eq!(shown.weight, "65 kg");
        assert_eq!(shown.heart_rate, "72 bpm");
        assert_eq!(shown.blood_pressure, "120/80");
        assert_eq!(shown.temperature, "36.8 °C");
        assert_eq!(shown.oxygen_saturation, "98%");
        assert_eq!(shown.bmi, "22.5");
        assert_eq!(shown.height_weight(), "170 cm / 65 kg");
    }

    #[test]
    fn test_absent_values_render_placeholder_not_zero() {
        let shown = VitalsSnapshot::default().display();
        for column in [
            &shown.height,
            &shown.weight,
            &shown.heart_rate,
            &shown.blood_pressure,
            &shown.temperature,
            &shown.oxygen_saturation,
            &shown.bmi,
        ] {
            assert_eq!(column, PLACEHOLDER);
        }
    }
}
