//! Light device abstraction.
//!
//! The engine talks to devices only through [`LightControl`]. Implementations
//! wrap whatever transport actually reaches the lights; [`MemoryLights`] keeps
//! everything in memory for tests and the simulator CLI.

pub mod memory;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::color::{ColorMode, ColorValue};
use crate::error::DispatchError;

pub use memory::{LightCall, MemoryLights};

/// Observed state of a light.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightSnapshot {
    pub on: bool,
    pub brightness: Option<u8>,
    pub color_mode: ColorMode,
    pub color: Option<ColorValue>,
}

impl LightSnapshot {
    pub fn off() -> Self {
        Self::default()
    }

    pub fn on_with(color: ColorValue, brightness: u8) -> Self {
        Self {
            on: true,
            brightness: Some(brightness),
            color_mode: color.mode(),
            color: Some(color),
        }
    }
}

/// A single update. Absent fields are left as they are on the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightCommand {
    pub color: Option<ColorValue>,
    pub brightness: Option<u8>,
    /// Seconds
    pub transition: f64,
}

/// Async access to light devices.
///
/// Futures must be `Send`; the engine drives them from spawned tasks.
pub trait LightControl: Send + Sync + 'static {
    /// Current state, `None` for an unknown light.
    fn snapshot(&self, light: &str) -> impl Future<Output = Option<LightSnapshot>> + Send;

    fn is_on(&self, light: &str) -> impl Future<Output = bool> + Send;

    fn set_light(
        &self,
        light: &str,
        command: LightCommand,
    ) -> impl Future<Output = Result<(), DispatchError>> + Send;

    fn turn_on(&self, light: &str) -> impl Future<Output = Result<(), DispatchError>> + Send;

    fn turn_off(&self, light: &str) -> impl Future<Output = Result<(), DispatchError>> + Send;
}
