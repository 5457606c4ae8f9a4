//! Color group configuration.

use serde::{Deserialize, Serialize};

use crate::scene::NumberOrRange;

pub const DEFAULT_COLOR_WEIGHT: u32 = 10;

/// Representation a color group's `color` value is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorType {
    #[serde(alias = "rgb_color")]
    Rgb,
    #[serde(alias = "rgbw_color")]
    Rgbw,
    #[serde(alias = "rgbww_color")]
    Rgbww,
    #[serde(alias = "xy_color")]
    Xy,
    #[serde(alias = "hs_color")]
    Hs,
    /// Mireds. Converted to kelvin when the scene is loaded.
    ColorTemp,
    ColorTempKelvin,
}

impl ColorType {
    /// Number of components the `color` value must carry.
    pub fn arity(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgbw => 4,
            Self::Rgbww => 5,
            Self::Xy | Self::Hs => 2,
            Self::ColorTemp | Self::ColorTempKelvin => 1,
        }
    }

    /// RGB-family types support per-channel "nearby" perturbation.
    pub fn is_rgb_family(self) -> bool {
        matches!(self, Self::Rgb | Self::Rgbw | Self::Rgbww)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "rgb",
            Self::Rgbw => "rgbw",
            Self::Rgbww => "rgbww",
            Self::Xy => "xy",
            Self::Hs => "hs",
            Self::ColorTemp => "color_temp",
            Self::ColorTempKelvin => "color_temp_kelvin",
        }
    }
}

/// Raw `color` value: a scalar for temperatures, a list for everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorComponents {
    Scalar(f64),
    List(Vec<f64>),
}

impl ColorComponents {
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::Scalar(v) => std::slice::from_ref(v),
            Self::List(values) => values,
        }
    }
}

/// One entry of a scene's `colors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorGroupConfig {
    pub color_type: ColorType,
    pub color: ColorComponents,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<NumberOrRange<u8>>,

    /// Relative selection probability
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// 0 disables; 1-100 is the perturbation radius in percent of channel range
    #[serde(default)]
    pub nearby_colors: u8,

    /// Change color or brightness on a tick, never both
    #[serde(default)]
    pub one_change_per_tick: bool,
}

fn default_weight() -> u32 {
    DEFAULT_COLOR_WEIGHT
}
