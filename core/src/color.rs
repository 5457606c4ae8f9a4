//! Concrete color values sent to and read from lights.

use std::fmt;

use glimmer_types::ColorType;
use serde::{Deserialize, Serialize};

pub const MIN_KELVIN: u16 = 1500;
pub const MAX_KELVIN: u16 = 9000;

/// A color in one of the representations a light accepts.
///
/// The variant doubles as the light's color mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ColorValue {
    Rgb([u8; 3]),
    Rgbw([u8; 4]),
    Rgbww([u8; 5]),
    Xy(f32, f32),
    Hs(f32, f32),
    /// Kelvin
    ColorTemp(u16),
}

impl ColorValue {
    pub fn mode(&self) -> ColorMode {
        match self {
            Self::Rgb(_) => ColorMode::Rgb,
            Self::Rgbw(_) => ColorMode::Rgbw,
            Self::Rgbww(_) => ColorMode::Rgbww,
            Self::Xy(..) => ColorMode::Xy,
            Self::Hs(..) => ColorMode::Hs,
            Self::ColorTemp(_) => ColorMode::ColorTemp,
        }
    }

    /// Same color type with the RGB-family channels replaced.
    ///
    /// Non-RGB values are returned unchanged.
    pub fn with_channels(&self, mut f: impl FnMut(u8) -> u8) -> Self {
        match *self {
            Self::Rgb(c) => Self::Rgb(c.map(&mut f)),
            Self::Rgbw(c) => Self::Rgbw(c.map(&mut f)),
            Self::Rgbww(c) => Self::Rgbww(c.map(&mut f)),
            other => other,
        }
    }
}

impl fmt::Display for ColorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb([r, g, b]) => write!(f, "rgb({r}, {g}, {b})"),
            Self::Rgbw([r, g, b, w]) => write!(f, "rgbw({r}, {g}, {b}, {w})"),
            Self::Rgbww([r, g, b, cw, ww]) => write!(f, "rgbww({r}, {g}, {b}, {cw}, {ww})"),
            Self::Xy(x, y) => write!(f, "xy({x:.4}, {y:.4})"),
            Self::Hs(h, s) => write!(f, "hs({h:.1}, {s:.1})"),
            Self::ColorTemp(k) => write!(f, "{k}K"),
        }
    }
}

/// How a light is currently producing color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    Rgb,
    Rgbw,
    Rgbww,
    Xy,
    Hs,
    ColorTemp,
    /// White channel only, no color value
    White,
    /// On/off or brightness-only devices
    #[default]
    Unknown,
}

impl From<ColorType> for ColorMode {
    fn from(value: ColorType) -> Self {
        match value {
            ColorType::Rgb => Self::Rgb,
            ColorType::Rgbw => Self::Rgbw,
            ColorType::Rgbww => Self::Rgbww,
            ColorType::Xy => Self::Xy,
            ColorType::Hs => Self::Hs,
            ColorType::ColorTemp | ColorType::ColorTempKelvin => Self::ColorTemp,
        }
    }
}

/// Convert mireds to kelvin, clamped to the supported range.
///
/// Returns `None` for zero mireds.
pub fn mireds_to_kelvin(mireds: u32) -> Option<u16> {
    if mireds == 0 {
        return None;
    }
    let kelvin = (1_000_000 / mireds).clamp(u32::from(MIN_KELVIN), u32::from(MAX_KELVIN));
    u16::try_from(kelvin).ok()
}
