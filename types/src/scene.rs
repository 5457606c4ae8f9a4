//! Scene configuration as written in scene files.

use serde::{Deserialize, Serialize};

use crate::color::ColorGroupConfig;

pub const DEFAULT_PRIORITY: i32 = 0;
pub const DEFAULT_TRANSITION_SECS: f64 = 1.0;
pub const CHANGE_AMOUNT_ALL: &str = "all";

/// A scalar or a two-element `[min, max]` list.
///
/// The list form is kept as a `Vec` so a wrong length can be reported as a
/// configuration error instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrRange<T> {
    Single(T),
    Range(Vec<T>),
}

/// `change_amount`: a count, a `[min, max]` range, or the keyword `"all"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeAmountConfig {
    Count(u32),
    Range(Vec<u32>),
    Keyword(String),
}

impl Default for ChangeAmountConfig {
    fn default() -> Self {
        Self::Keyword(CHANGE_AMOUNT_ALL.to_string())
    }
}

/// One animated scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub name: String,
    pub lights: Vec<String>,

    #[serde(default)]
    pub colors: Vec<ColorGroupConfig>,

    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Scene-wide brightness; a single value overrides every color group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<NumberOrRange<u8>>,

    /// Seconds
    #[serde(default = "default_transition")]
    pub transition: NumberOrRange<f64>,

    /// Seconds between ticks. Absent means the scene is applied once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_frequency: Option<NumberOrRange<f64>>,

    #[serde(default)]
    pub change_amount: ChangeAmountConfig,

    #[serde(default)]
    pub change_sequence: bool,

    #[serde(default = "default_true")]
    pub animate_brightness: bool,

    #[serde(default = "default_true")]
    pub animate_color: bool,

    #[serde(default = "default_true")]
    pub ignore_off: bool,

    #[serde(default = "default_true")]
    pub restore: bool,

    #[serde(default)]
    pub restore_power: bool,
}

/// A scene file holds any number of `[[scene]]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    #[serde(rename = "scene", default)]
    pub scenes: Vec<SceneConfig>,
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_transition() -> NumberOrRange<f64> {
    NumberOrRange::Single(DEFAULT_TRANSITION_SECS)
}

fn default_true() -> bool {
    true
}
