//! Normalized animation settings.
//!
//! Scene files are loosely typed: ranges are two-element lists or scalars,
//! `change_amount` may be the keyword `"all"`, colors are number lists whose
//! arity depends on the declared type. [`AnimationSpec::from_config`] turns a
//! [`SceneConfig`] into tagged variants the engine consumes uniformly, and
//! rejects anything malformed before an animation starts.

pub mod loader;

use glimmer_types::{
    ChangeAmountConfig, ColorGroupConfig, ColorType, NumberOrRange, SceneConfig,
    scene::CHANGE_AMOUNT_ALL,
};
use rand::Rng;
use rand::distributions::uniform::SampleUniform;

use crate::color::{ColorValue, mireds_to_kelvin};
use crate::error::{SceneError, SceneResult};

pub use loader::{SceneLibrary, default_scene_dir, load_directory, load_file, save_file};

pub const PRIORITY_MIN: i32 = -100;
pub const PRIORITY_MAX: i32 = 100;
pub const TRANSITION_MAX_SECS: f64 = 6553.0;
pub const CHANGE_FREQUENCY_MAX_SECS: f64 = 60.0;
pub const NEARBY_COLORS_MAX: u8 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Tagged values
// ─────────────────────────────────────────────────────────────────────────────

/// A fixed value or an inclusive `[lo, hi]` range drawn uniformly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Span<T> {
    Fixed(T),
    Range(T, T),
}

impl<T: SampleUniform + PartialOrd + Copy> Span<T> {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        match *self {
            Self::Fixed(v) => v,
            Self::Range(lo, hi) => rng.gen_range(lo..=hi),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }
}

/// How many lights change on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAmount {
    Fixed(usize),
    Range(usize, usize),
    All,
}

impl ChangeAmount {
    /// Draw a count for this tick, clamped to the number of owned lights.
    pub fn sample<R: Rng + ?Sized>(&self, available: usize, rng: &mut R) -> usize {
        let amount = match *self {
            Self::Fixed(n) => n,
            Self::Range(lo, hi) => rng.gen_range(lo..=hi),
            Self::All => available,
        };
        amount.min(available)
    }
}

/// A validated color group.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorGroup {
    pub value: ColorValue,
    pub brightness: Option<Span<u8>>,
    pub weight: u32,
    /// Perturbation radius in percent; 0 disables. Always 0 for non-RGB types.
    pub nearby: u8,
    pub one_change_per_tick: bool,
}

/// Immutable configuration of one animation session.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSpec {
    pub name: String,
    pub priority: i32,
    /// Deduplicated, in configured order
    pub lights: Vec<String>,
    pub colors: Vec<ColorGroup>,
    pub brightness: Option<Span<u8>>,
    /// Seconds
    pub transition: Span<f64>,
    /// Seconds; `None` makes the animation one-shot
    pub change_frequency: Option<Span<f64>>,
    pub change_amount: ChangeAmount,
    pub change_sequence: bool,
    pub animate_brightness: bool,
    pub animate_color: bool,
    pub ignore_off: bool,
    pub restore: bool,
    pub restore_power: bool,
}

impl AnimationSpec {
    /// Validate and normalize a scene from a scene file.
    pub fn from_config(config: &SceneConfig) -> SceneResult<Self> {
        let name = config.name.trim();
        if name.is_empty() {
            return Err(SceneError::configuration("scene name must not be empty"));
        }

        let mut lights: Vec<String> = Vec::with_capacity(config.lights.len());
        for light in &config.lights {
            if !lights.contains(light) {
                lights.push(light.clone());
            }
        }
        if lights.is_empty() {
            return Err(SceneError::configuration(format!("scene '{name}' must select lights")));
        }

        if config.colors.is_empty() {
            return Err(SceneError::configuration(format!("scene '{name}' has no colors")));
        }
        let colors = config
            .colors
            .iter()
            .enumerate()
            .map(|(idx, group)| normalize_group(name, idx, group))
            .collect::<SceneResult<Vec<_>>>()?;

        if !(PRIORITY_MIN..=PRIORITY_MAX).contains(&config.priority) {
            return Err(SceneError::configuration(format!(
                "priority {} is outside {PRIORITY_MIN}..={PRIORITY_MAX}",
                config.priority
            )));
        }

        let brightness = config
            .brightness
            .as_ref()
            .map(|b| span_u8(b, "brightness"))
            .transpose()?;
        let transition = span_secs(&config.transition, "transition", TRANSITION_MAX_SECS)?;
        let change_frequency = config
            .change_frequency
            .as_ref()
            .map(|f| span_secs(f, "change_frequency", CHANGE_FREQUENCY_MAX_SECS))
            .transpose()?;

        Ok(Self {
            name: name.to_string(),
            priority: config.priority,
            lights,
            colors,
            brightness,
            transition,
            change_frequency,
            change_amount: change_amount(&config.change_amount)?,
            change_sequence: config.change_sequence,
            animate_brightness: config.animate_brightness,
            animate_color: config.animate_color,
            ignore_off: config.ignore_off,
            restore: config.restore,
            restore_power: config.restore_power,
        })
    }

    pub fn is_one_shot(&self) -> bool {
        self.change_frequency.is_none()
    }
}

impl TryFrom<&SceneConfig> for AnimationSpec {
    type Error = SceneError;

    fn try_from(config: &SceneConfig) -> Result<Self, Self::Error> {
        Self::from_config(config)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Normalization helpers
// ─────────────────────────────────────────────────────────────────────────────

fn normalize_group(scene: &str, idx: usize, group: &ColorGroupConfig) -> SceneResult<ColorGroup> {
    let ctx = format!("scene '{scene}' color #{}", idx + 1);

    if group.weight == 0 {
        return Err(SceneError::configuration(format!("{ctx}: weight must be positive")));
    }
    if group.nearby_colors > NEARBY_COLORS_MAX {
        return Err(SceneError::configuration(format!(
            "{ctx}: nearby_colors must be within 0..={NEARBY_COLORS_MAX}"
        )));
    }

    let value = color_value(group.color_type, group.color.as_slice())
        .map_err(|msg| SceneError::configuration(format!("{ctx}: {msg}")))?;

    let nearby = if group.nearby_colors > 0 && !group.color_type.is_rgb_family() {
        tracing::warn!(
            scene,
            color_type = group.color_type.as_str(),
            "nearby_colors only applies to rgb, rgbw and rgbww colors, ignoring"
        );
        0
    } else {
        group.nearby_colors
    };

    let brightness = group
        .brightness
        .as_ref()
        .map(|b| span_u8(b, "brightness"))
        .transpose()
        .map_err(|e| SceneError::configuration(format!("{ctx}: {e}")))?;

    Ok(ColorGroup {
        value,
        brightness,
        weight: group.weight,
        nearby,
        one_change_per_tick: group.one_change_per_tick,
    })
}

fn color_value(color_type: ColorType, raw: &[f64]) -> Result<ColorValue, String> {
    if raw.len() != color_type.arity() {
        return Err(format!(
            "{} colors need {} components, got {}",
            color_type.as_str(),
            color_type.arity(),
            raw.len()
        ));
    }

    let value = match color_type {
        ColorType::Rgb => ColorValue::Rgb([byte(raw[0])?, byte(raw[1])?, byte(raw[2])?]),
        ColorType::Rgbw => {
            ColorValue::Rgbw([byte(raw[0])?, byte(raw[1])?, byte(raw[2])?, byte(raw[3])?])
        }
        ColorType::Rgbww => ColorValue::Rgbww([
            byte(raw[0])?,
            byte(raw[1])?,
            byte(raw[2])?,
            byte(raw[3])?,
            byte(raw[4])?,
        ]),
        ColorType::Xy => {
            let (x, y) = (raw[0], raw[1]);
            if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                return Err(format!("xy values must be within 0..=1, got ({x}, {y})"));
            }
            ColorValue::Xy(x as f32, y as f32)
        }
        ColorType::Hs => {
            let (h, s) = (raw[0], raw[1]);
            if !(0.0..=360.0).contains(&h) || !(0.0..=100.0).contains(&s) {
                return Err(format!("hs values must be within 0..=360 and 0..=100, got ({h}, {s})"));
            }
            ColorValue::Hs(h as f32, s as f32)
        }
        ColorType::ColorTemp => {
            let mireds = whole(raw[0])?;
            let kelvin = u32::try_from(mireds)
                .ok()
                .and_then(mireds_to_kelvin)
                .ok_or_else(|| format!("color temperature must be positive mireds, got {mireds}"))?;
            tracing::debug!(mireds, kelvin, "Converted color temperature to kelvin");
            ColorValue::ColorTemp(kelvin)
        }
        ColorType::ColorTempKelvin => {
            let kelvin = whole(raw[0])?;
            let kelvin = u16::try_from(kelvin)
                .ok()
                .filter(|k| *k > 0)
                .ok_or_else(|| format!("kelvin must be a positive integer, got {kelvin}"))?;
            ColorValue::ColorTemp(kelvin)
        }
    };
    Ok(value)
}

fn whole(v: f64) -> Result<i64, String> {
    if v.fract() != 0.0 || !v.is_finite() {
        return Err(format!("expected a whole number, got {v}"));
    }
    Ok(v as i64)
}

fn byte(v: f64) -> Result<u8, String> {
    let n = whole(v)?;
    u8::try_from(n).map_err(|_| format!("channel value {n} is outside 0..=255"))
}

fn span_u8(value: &NumberOrRange<u8>, field: &str) -> SceneResult<Span<u8>> {
    match value {
        NumberOrRange::Single(v) => Ok(Span::Fixed(*v)),
        NumberOrRange::Range(values) => match values.as_slice() {
            [lo, hi] if lo == hi => Ok(Span::Fixed(*lo)),
            [lo, hi] if lo < hi => Ok(Span::Range(*lo, *hi)),
            [lo, hi] => Err(SceneError::configuration(format!(
                "{field} range [{lo}, {hi}] has min above max"
            ))),
            other => Err(SceneError::configuration(format!(
                "{field} range must have exactly two values, got {}",
                other.len()
            ))),
        },
    }
}

fn span_secs(value: &NumberOrRange<f64>, field: &str, max: f64) -> SceneResult<Span<f64>> {
    let check = |v: f64| {
        if v.is_finite() && (0.0..=max).contains(&v) {
            Ok(v)
        } else {
            Err(SceneError::configuration(format!("{field} {v} is outside 0..={max} seconds")))
        }
    };
    match value {
        NumberOrRange::Single(v) => Ok(Span::Fixed(check(*v)?)),
        NumberOrRange::Range(values) => match values.as_slice() {
            [lo, hi] => {
                let (lo, hi) = (check(*lo)?, check(*hi)?);
                if lo > hi {
                    Err(SceneError::configuration(format!(
                        "{field} range [{lo}, {hi}] has min above max"
                    )))
                } else if lo == hi {
                    Ok(Span::Fixed(lo))
                } else {
                    Ok(Span::Range(lo, hi))
                }
            }
            other => Err(SceneError::configuration(format!(
                "{field} range must have exactly two values, got {}",
                other.len()
            ))),
        },
    }
}

fn change_amount(value: &ChangeAmountConfig) -> SceneResult<ChangeAmount> {
    match value {
        ChangeAmountConfig::Count(n) => Ok(ChangeAmount::Fixed(*n as usize)),
        ChangeAmountConfig::Keyword(word) if word.eq_ignore_ascii_case(CHANGE_AMOUNT_ALL) => {
            Ok(ChangeAmount::All)
        }
        ChangeAmountConfig::Keyword(word) => Err(SceneError::configuration(format!(
            "change_amount must be a number, a range or \"all\", got \"{word}\""
        ))),
        ChangeAmountConfig::Range(values) => match values.as_slice() {
            [lo, hi] if lo == hi => Ok(ChangeAmount::Fixed(*lo as usize)),
            [lo, hi] if lo < hi => Ok(ChangeAmount::Range(*lo as usize, *hi as usize)),
            [lo, hi] => Err(SceneError::configuration(format!(
                "change_amount range [{lo}, {hi}] has min above max"
            ))),
            other => Err(SceneError::configuration(format!(
                "change_amount range must have exactly two values, got {}",
                other.len()
            ))),
        },
    }
}
