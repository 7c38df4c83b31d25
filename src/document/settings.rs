//! Document-level print settings: the bottom/normal defaults every layer
//! falls back to, plus resolution and physical pixel size.

use super::modifier::{LayerParameter, PrintParameterModifier};
use crate::geometry::Size;
use serde::{Deserialize, Serialize};

/// Decimal places kept for Z positions and layer heights.
pub const HEIGHT_PRECISION: i32 = 3;
/// Decimal places kept for kinematic parameters.
pub const PARAMETER_PRECISION: i32 = 2;

pub const DEFAULT_LAYER_HEIGHT: f32 = 0.05;
pub const DEFAULT_BOTTOM_LAYER_COUNT: u32 = 4;
pub const DEFAULT_BOTTOM_EXPOSURE_TIME: f32 = 30.0;
pub const DEFAULT_EXPOSURE_TIME: f32 = 3.0;
pub const DEFAULT_LIFT_HEIGHT: f32 = 5.0;
pub const DEFAULT_LIFT_SPEED: f32 = 100.0;
pub const DEFAULT_LIFT_HEIGHT2: f32 = 0.0;
pub const DEFAULT_LIFT_SPEED2: f32 = 300.0;
pub const DEFAULT_RETRACT_SPEED: f32 = 100.0;
pub const DEFAULT_RETRACT_HEIGHT2: f32 = 0.0;
pub const DEFAULT_RETRACT_SPEED2: f32 = 80.0;
pub const DEFAULT_LIGHT_PWM: u8 = 255;
pub const DEFAULT_BOTTOM_LIGHT_PWM: u8 = 255;

/// Rounds `value` to `digits` decimal places.
#[inline]
pub fn round_to(value: f32, digits: i32) -> f32 {
    let factor = 10f32.powi(digits);
    (value * factor).round() / factor
}

/// Rounds a Z position or layer height to [`HEIGHT_PRECISION`].
#[inline]
pub fn round_height(value: f32) -> f32 {
    round_to(value, HEIGHT_PRECISION)
}

/// Rounds a kinematic value to [`PARAMETER_PRECISION`]; PWM is stored whole.
#[inline]
pub fn round_parameter(param: LayerParameter, value: f32) -> f32 {
    match param {
        LayerParameter::LightPwm => value,
        _ => round_to(value, PARAMETER_PRECISION),
    }
}

/// One full set of kinematic parameters.
///
/// Used both for the document's bottom/normal defaults and as the storage of
/// each layer's own values.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub light_off_delay: f32,
    pub wait_time_before_cure: f32,
    pub exposure_time: f32,
    pub wait_time_after_cure: f32,
    pub lift_height: f32,
    pub lift_speed: f32,
    pub lift_height2: f32,
    pub lift_speed2: f32,
    pub wait_time_after_lift: f32,
    pub retract_speed: f32,
    pub retract_height2: f32,
    pub retract_speed2: f32,
    pub light_pwm: u8,
}

impl ParameterSet {
    /// Factory defaults for bottom layers.
    pub fn bottom_defaults() -> Self {
        Self {
            exposure_time: DEFAULT_BOTTOM_EXPOSURE_TIME,
            light_pwm: DEFAULT_BOTTOM_LIGHT_PWM,
            ..Self::normal_defaults()
        }
    }

    /// Factory defaults for normal layers.
    pub fn normal_defaults() -> Self {
        Self {
            light_off_delay: 0.0,
            wait_time_before_cure: 0.0,
            exposure_time: DEFAULT_EXPOSURE_TIME,
            wait_time_after_cure: 0.0,
            lift_height: DEFAULT_LIFT_HEIGHT,
            lift_speed: DEFAULT_LIFT_SPEED,
            lift_height2: DEFAULT_LIFT_HEIGHT2,
            lift_speed2: DEFAULT_LIFT_SPEED2,
            wait_time_after_lift: 0.0,
            retract_speed: DEFAULT_RETRACT_SPEED,
            retract_height2: DEFAULT_RETRACT_HEIGHT2,
            retract_speed2: DEFAULT_RETRACT_SPEED2,
            light_pwm: DEFAULT_LIGHT_PWM,
        }
    }

    /// Reads one parameter; PWM is widened to `f32`.
    pub fn get(&self, param: LayerParameter) -> f32 {
        use LayerParameter::*;
        match param {
            LightOffDelay => self.light_off_delay,
            WaitTimeBeforeCure => self.wait_time_before_cure,
            ExposureTime => self.exposure_time,
            WaitTimeAfterCure => self.wait_time_after_cure,
            LiftHeight => self.lift_height,
            LiftSpeed => self.lift_speed,
            LiftHeight2 => self.lift_height2,
            LiftSpeed2 => self.lift_speed2,
            WaitTimeAfterLift => self.wait_time_after_lift,
            RetractSpeed => self.retract_speed,
            RetractHeight2 => self.retract_height2,
            RetractSpeed2 => self.retract_speed2,
            LightPwm => f32::from(self.light_pwm),
        }
    }

    /// Writes one parameter without any validation.
    pub fn set_raw(&mut self, param: LayerParameter, value: f32) {
        use LayerParameter::*;
        let slot = match param {
            LightOffDelay => &mut self.light_off_delay,
            WaitTimeBeforeCure => &mut self.wait_time_before_cure,
            ExposureTime => &mut self.exposure_time,
            WaitTimeAfterCure => &mut self.wait_time_after_cure,
            LiftHeight => &mut self.lift_height,
            LiftSpeed => &mut self.lift_speed,
            LiftHeight2 => &mut self.lift_height2,
            LiftSpeed2 => &mut self.lift_speed2,
            WaitTimeAfterLift => &mut self.wait_time_after_lift,
            RetractSpeed => &mut self.retract_speed,
            RetractHeight2 => &mut self.retract_height2,
            RetractSpeed2 => &mut self.retract_speed2,
            LightPwm => {
                self.light_pwm = value.clamp(0.0, 255.0) as u8;
                return;
            }
        };
        *slot = value;
    }

    /// Writes one parameter rounded with [`round_parameter`].
    #[inline]
    pub fn set(&mut self, param: LayerParameter, value: f32) {
        self.set_raw(param, round_parameter(param, value));
    }

    /// A copy with every parameter rounded with [`round_parameter`].
    pub fn rounded(&self) -> Self {
        let mut out = *self;
        for param in LayerParameter::ALL {
            out.set(param, self.get(param));
        }
        out
    }
}

/// Global settings of the owning slice document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrintSettings {
    /// Raster resolution in pixels; zero until known.
    pub resolution: Size,
    /// Physical pixel width in millimetres.
    pub pixel_width_mm: f32,
    /// Physical pixel height in millimetres.
    pub pixel_height_mm: f32,
    /// Nominal layer height in millimetres.
    pub layer_height: f32,
    /// Number of leading layers tuned with the bottom values.
    pub bottom_layer_count: u32,
    pub bottom: ParameterSet,
    pub normal: ParameterSet,
    /// Parameters the target printer has no bottom variant for; edits of the
    /// normal value propagate to bottom layers too.
    #[serde(default)]
    pub bottom_unsupported: Vec<LayerParameter>,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            resolution: Size::default(),
            pixel_width_mm: 0.05,
            pixel_height_mm: 0.05,
            layer_height: DEFAULT_LAYER_HEIGHT,
            bottom_layer_count: DEFAULT_BOTTOM_LAYER_COUNT,
            bottom: ParameterSet::bottom_defaults(),
            normal: ParameterSet::normal_defaults(),
            bottom_unsupported: Vec::new(),
        }
    }
}

impl PrintSettings {
    /// Loads settings from a JSON document, rounding the defaults like any
    /// other document edit.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.normalize();
        Ok(settings)
    }

    /// Rounds the bottom and normal defaults in place.
    pub fn normalize(&mut self) {
        self.bottom = self.bottom.rounded();
        self.normal = self.normal.rounded();
    }

    /// Serializes settings to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[inline]
    pub fn is_bottom_layer(&self, layer_index: u32) -> bool {
        layer_index < self.bottom_layer_count
    }

    /// Bottom defaults for bottom layers, normal defaults otherwise.
    #[inline]
    pub fn bottom_or_normal(&self, layer_index: u32) -> &ParameterSet {
        if self.is_bottom_layer(layer_index) {
            &self.bottom
        } else {
            &self.normal
        }
    }

    /// The default a layer at `layer_index` falls back to, rounded the way
    /// layer values are stored.
    #[inline]
    pub fn bottom_or_normal_value(&self, layer_index: u32, param: LayerParameter) -> f32 {
        round_parameter(param, self.bottom_or_normal(layer_index).get(param))
    }

    /// Nominal Z of a layer: levels are 1-based, so layer 0 sits one layer height up.
    #[inline]
    pub fn height_from_layer(&self, layer_index: u32) -> f32 {
        round_height((layer_index as f32 + 1.0) * self.layer_height)
    }

    #[inline]
    pub fn supports_bottom(&self, param: LayerParameter) -> bool {
        !self.bottom_unsupported.contains(&param)
    }

    /// Area of one pixel in mm².
    #[inline]
    pub fn pixel_area_mm2(&self) -> f32 {
        self.pixel_width_mm * self.pixel_height_mm
    }

    /// Applies a document-level edit, rounded like layer edits. Returns
    /// `false` for `PositionZ`, which only exists per layer.
    pub fn set_value_from_modifier(&mut self, modifier: PrintParameterModifier, value: f32) -> bool {
        match modifier {
            PrintParameterModifier::PositionZ => false,
            PrintParameterModifier::BottomLayerCount => {
                self.bottom_layer_count = value.max(0.0) as u32;
                true
            }
            PrintParameterModifier::Normal(p) => {
                self.normal.set(p, value);
                true
            }
            PrintParameterModifier::Bottom(p) => {
                self.bottom.set(p, value);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bottom_or_normal_switches_at_bottom_count() {
        let s = PrintSettings::default();
        assert_eq!(s.bottom_or_normal_value(0, LayerParameter::ExposureTime), 30.0);
        assert_eq!(s.bottom_or_normal_value(3, LayerParameter::ExposureTime), 30.0);
        assert_eq!(s.bottom_or_normal_value(4, LayerParameter::ExposureTime), 3.0);
    }

    #[test]
    fn heights_are_one_based_and_rounded() {
        let s = PrintSettings::default();
        assert_eq!(s.height_from_layer(0), 0.05);
        assert_eq!(s.height_from_layer(2), 0.15);
        assert_eq!(round_height(0.123_456), 0.123);
    }

    #[test]
    fn document_edits_and_loaded_defaults_are_rounded() {
        let mut s = PrintSettings::default();
        assert!(s.set_value_from_modifier(
            PrintParameterModifier::Normal(LayerParameter::LiftSpeed),
            123.456
        ));
        assert_eq!(s.normal.lift_speed, 123.46);
        assert!(s.set_value_from_modifier(
            PrintParameterModifier::Bottom(LayerParameter::LightPwm),
            17.0
        ));
        assert_eq!(s.bottom.light_pwm, 17);

        let mut raw = PrintSettings::default();
        raw.bottom.exposure_time = 2.555_5;
        let loaded = PrintSettings::from_json(&raw.to_json().unwrap()).unwrap();
        assert_eq!(loaded.bottom.exposure_time, 2.56);
        assert_eq!(raw.bottom_or_normal_value(0, LayerParameter::ExposureTime), 2.56);
    }

    #[test]
    fn settings_json_round_trip() {
        let mut s = PrintSettings::default();
        s.bottom_unsupported.push(LayerParameter::LiftSpeed2);
        let json = s.to_json().unwrap();
        assert_eq!(PrintSettings::from_json(&json).unwrap(), s);
    }

    #[test]
    fn missing_bottom_unsupported_defaults_to_empty() {
        let mut value = serde_json::to_value(PrintSettings::default()).unwrap();
        value.as_object_mut().unwrap().remove("bottom_unsupported");
        let s: PrintSettings = serde_json::from_value(value).unwrap();
        assert!(s.bottom_unsupported.is_empty());
    }
}
