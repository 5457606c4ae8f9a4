//! Pre-animation light state.
//!
//! A snapshot is taken the first time any animation claims a light and kept
//! until the light leaves animation control entirely. Ownership transfer
//! between animations leaves the snapshot alone, so the eventual restore
//! returns the light to how it looked before the first animation touched it.

use hashbrown::HashMap;

use crate::color::ColorValue;
use crate::light::{LightCommand, LightControl, LightSnapshot};

/// Transition used when putting a light back, in seconds
pub const RESTORE_TRANSITION_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorLightState {
    pub state: LightSnapshot,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Evict without touching the device
    pub skip_restore: bool,
    /// Turn lights that were off before the animation back off
    pub restore_power: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// No snapshot was held
    Missing,
    /// Evicted without a device command
    Released,
    Restored,
    /// Prior state was off and power restore is disabled
    LeftOn,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct LightStateStore {
    states: HashMap<String, PriorLightState>,
}

impl LightStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot` unless the light already has one. Returns the held state.
    pub fn capture(&mut self, light: &str, snapshot: LightSnapshot) -> PriorLightState {
        *self
            .states
            .entry_ref(light)
            .or_insert(PriorLightState { state: snapshot })
    }

    /// Drop a snapshot without restoring it.
    pub fn release(&mut self, light: &str) -> Option<PriorLightState> {
        self.states.remove(light)
    }

    /// Light ids with a held snapshot, sorted
    pub fn lights(&self) -> Vec<String> {
        let mut lights: Vec<String> = self.states.keys().cloned().collect();
        lights.sort_unstable();
        lights
    }

    /// Evict the snapshot and, unless skipped, put the light back.
    pub async fn restore<L: LightControl>(
        &mut self,
        light: &str,
        options: RestoreOptions,
        control: &L,
    ) -> RestoreOutcome {
        if options.skip_restore {
            return match self.release(light) {
                Some(_) => {
                    tracing::debug!(light, "Released light without restore");
                    RestoreOutcome::Released
                }
                None => RestoreOutcome::Missing,
            };
        }
        let Some(prior) = self.states.remove(light) else {
            return RestoreOutcome::Missing;
        };

        let result = if prior.state.on {
            control.set_light(light, restore_command(&prior.state)).await
        } else if options.restore_power {
            control.turn_off(light).await
        } else {
            return RestoreOutcome::LeftOn;
        };

        match result {
            Ok(()) => {
                tracing::debug!(light, on = prior.state.on, "Restored light");
                RestoreOutcome::Restored
            }
            Err(e) => {
                tracing::warn!(light, error = %e, "Failed to restore light");
                RestoreOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Command that re-applies the prior color in its prior mode.
fn restore_command(state: &LightSnapshot) -> LightCommand {
    let color = state.color.filter(|c: &ColorValue| c.mode() == state.color_mode);
    LightCommand {
        color,
        brightness: state.brightness,
        transition: RESTORE_TRANSITION_SECS,
    }
}
