//! Real-world unit conversion for the measurement tools.
//!
//! Calibration is captured once at some zoom level; every later readout
//! compensates for the current zoom so a measured wall stays the same number
//! of centimeters whether the user is at 50% or 200%.

use serde::{Deserialize, Serialize};

/// Default pixels-per-unit before calibration: 96 dpi / 2.54 ≈ one CSS
/// centimeter, a usable guess until the user calibrates.
const DEFAULT_PIXELS_PER_UNIT: f64 = 37.8;

/// Pixel-to-unit calibration plus the zoom scale it was captured at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureCalibration {
    pub pixels_per_unit: f64,
    pub calibration_scale: f64,
    pub unit_label: String,
    pub is_calibrated: bool,
}

impl Default for MeasureCalibration {
    fn default() -> Self {
        Self {
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            calibration_scale: 1.0,
            unit_label: "cm".to_string(),
            is_calibrated: false,
        }
    }
}

impl MeasureCalibration {
    /// Record a calibration taken at `calibration_scale` zoom.
    pub fn apply(&mut self, pixels_per_unit: f64, calibration_scale: f64) {
        self.pixels_per_unit = pixels_per_unit;
        self.calibration_scale = calibration_scale;
        self.is_calibrated = true;
    }

    /// Calibration adjusted for the current zoom scale.
    pub fn effective_pixels_per_unit(&self, current_scale: f64) -> f64 {
        effective_pixels_per_unit(self.pixels_per_unit, self.calibration_scale, current_scale)
    }
}

/// Adjust a calibration for the zoom ratio between now and calibration time.
/// Non-positive or non-finite inputs pass the calibration through unchanged.
pub fn effective_pixels_per_unit(
    pixels_per_unit: f64,
    calibration_scale: f64,
    current_scale: f64,
) -> f64 {
    if !pixels_per_unit.is_finite() || pixels_per_unit <= 0.0 {
        return pixels_per_unit;
    }

    if !calibration_scale.is_finite() || calibration_scale <= 0.0 {
        return pixels_per_unit;
    }

    pixels_per_unit * (current_scale / calibration_scale)
}

/// Format a pixel distance as a calibrated length, falling back to raw
/// pixels while uncalibrated.
pub fn format_distance_label(pixel_distance: f64, pixels_per_unit: f64, unit_label: &str) -> String {
    if !pixels_per_unit.is_finite() || pixels_per_unit <= 0.0 {
        return format!("{:.1} px", pixel_distance);
    }

    format!("{:.2} {}", pixel_distance / pixels_per_unit, unit_label)
}

/// Format a pixel area as a calibrated area (unit squared).
pub fn format_area_label(area_pixels: f64, pixels_per_unit: f64, unit_label: &str) -> String {
    if !pixels_per_unit.is_finite() || pixels_per_unit <= 0.0 {
        return format!("{:.1} px²", area_pixels);
    }

    let area = area_pixels / (pixels_per_unit * pixels_per_unit);
    format!("{:.2} {}²", area, unit_label)
}
