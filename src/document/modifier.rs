//! Typed print-parameter keys.
//!
//! [`LayerParameter`] names one of the kinematic values every layer carries.
//! [`PrintParameterModifier`] is the wider set of editable keys a caller can
//! target, including document-level ones that a single layer does not accept.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How an out-of-range write to a parameter is detected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FallbackRule {
    /// Values `<= 0` are invalid (speeds, exposure).
    NonPositive,
    /// Values `< 0` are invalid (delays, heights).
    Negative,
    /// Every value is accepted.
    None,
}

/// One per-layer print parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerParameter {
    LightOffDelay,
    WaitTimeBeforeCure,
    ExposureTime,
    WaitTimeAfterCure,
    LiftHeight,
    LiftSpeed,
    LiftHeight2,
    LiftSpeed2,
    WaitTimeAfterLift,
    RetractSpeed,
    RetractHeight2,
    RetractSpeed2,
    LightPwm,
}

impl LayerParameter {
    /// Every parameter, in rebuild order. `RetractHeight2` follows both lift
    /// heights so its clamp sees the final lift total.
    pub const ALL: [LayerParameter; 13] = [
        LayerParameter::LightOffDelay,
        LayerParameter::WaitTimeBeforeCure,
        LayerParameter::ExposureTime,
        LayerParameter::WaitTimeAfterCure,
        LayerParameter::LiftHeight,
        LayerParameter::LiftSpeed,
        LayerParameter::LiftHeight2,
        LayerParameter::LiftSpeed2,
        LayerParameter::WaitTimeAfterLift,
        LayerParameter::RetractSpeed,
        LayerParameter::RetractHeight2,
        LayerParameter::RetractSpeed2,
        LayerParameter::LightPwm,
    ];

    pub fn fallback_rule(self) -> FallbackRule {
        use LayerParameter::*;
        match self {
            ExposureTime | LiftSpeed | LiftSpeed2 | RetractSpeed | RetractSpeed2 => {
                FallbackRule::NonPositive
            }
            LightOffDelay | WaitTimeBeforeCure | WaitTimeAfterCure | WaitTimeAfterLift
            | LiftHeight | LiftHeight2 | RetractHeight2 => FallbackRule::Negative,
            LightPwm => FallbackRule::None,
        }
    }

    /// True if `value` must be replaced by the document default.
    #[inline]
    pub fn is_out_of_range(self, value: f32) -> bool {
        match self.fallback_rule() {
            FallbackRule::NonPositive => !(value > 0.0),
            FallbackRule::Negative => !(value >= 0.0),
            FallbackRule::None => false,
        }
    }

    pub fn name(self) -> &'static str {
        use LayerParameter::*;
        match self {
            LightOffDelay => "LightOffDelay",
            WaitTimeBeforeCure => "WaitTimeBeforeCure",
            ExposureTime => "ExposureTime",
            WaitTimeAfterCure => "WaitTimeAfterCure",
            LiftHeight => "LiftHeight",
            LiftSpeed => "LiftSpeed",
            LiftHeight2 => "LiftHeight2",
            LiftSpeed2 => "LiftSpeed2",
            WaitTimeAfterLift => "WaitTimeAfterLift",
            RetractSpeed => "RetractSpeed",
            RetractHeight2 => "RetractHeight2",
            RetractSpeed2 => "RetractSpeed2",
            LightPwm => "LightPWM",
        }
    }
}

impl fmt::Display for LayerParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An editable print-parameter key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintParameterModifier {
    /// Absolute Z position of a layer.
    PositionZ,
    /// Document-level number of bottom layers.
    BottomLayerCount,
    /// A normal-layer value (or a per-layer value when applied to one layer).
    Normal(LayerParameter),
    /// A document-level bottom-layer value.
    Bottom(LayerParameter),
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl PrintParameterModifier {
    /// Resolves a textual key such as `"ExposureTime"`, `"bottom_lift_speed"`
    /// or `"Position Z"`. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        let key = normalize(name);
        match key.as_str() {
            "positionz" => return Some(Self::PositionZ),
            "bottomlayercount" => return Some(Self::BottomLayerCount),
            _ => {}
        }
        let (bottom, rest) = match key.strip_prefix("bottom") {
            Some(rest) => (true, rest),
            None => (false, key.as_str()),
        };
        let param = LayerParameter::ALL
            .into_iter()
            .find(|p| normalize(p.name()) == rest)?;
        Some(if bottom {
            Self::Bottom(param)
        } else {
            Self::Normal(param)
        })
    }

    /// The per-layer parameter this key affects, if any.
    pub fn layer_parameter(self) -> Option<LayerParameter> {
        match self {
            Self::Normal(p) | Self::Bottom(p) => Some(p),
            Self::PositionZ | Self::BottomLayerCount => None,
        }
    }
}

impl fmt::Display for PrintParameterModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositionZ => f.write_str("PositionZ"),
            Self::BottomLayerCount => f.write_str("BottomLayerCount"),
            Self::Normal(p) => write!(f, "{p}"),
            Self::Bottom(p) => write!(f, "Bottom{p}"),
        }
    }
}
