//! In-memory light backend.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use serde::Serialize;

use super::{LightCommand, LightControl, LightSnapshot};
use crate::error::DispatchError;

/// A command received by [`MemoryLights`], in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum LightCall {
    Set { light: String, command: LightCommand },
    TurnOn { light: String },
    TurnOff { light: String },
}

impl LightCall {
    pub fn light(&self) -> &str {
        match self {
            Self::Set { light, .. } | Self::TurnOn { light } | Self::TurnOff { light } => light,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    lights: HashMap<String, LightSnapshot>,
    calls: Vec<LightCall>,
    failing: HashSet<String>,
}

/// Lights held in memory.
///
/// Failed lights reject every command until recovered. Latency, when set,
/// delays each command before it is applied. Commands are only recorded
/// when the log is enabled with [`with_log`](Self::with_log).
#[derive(Debug, Default)]
pub struct MemoryLights {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
    log: bool,
}

impl MemoryLights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Record every command for [`calls`](Self::calls).
    pub fn with_log(mut self) -> Self {
        self.log = true;
        self
    }

    pub fn with_light(self, light: impl Into<String>, state: LightSnapshot) -> Self {
        self.insert(light, state);
        self
    }

    pub fn insert(&self, light: impl Into<String>, state: LightSnapshot) {
        self.lock().lights.insert(light.into(), state);
    }

    pub fn state(&self, light: &str) -> Option<LightSnapshot> {
        self.lock().lights.get(light).copied()
    }

    /// Known light ids, sorted
    pub fn light_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().lights.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn calls(&self) -> Vec<LightCall> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, light: &str) -> Vec<LightCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.light() == light)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make `light` reject commands until [`recover`](Self::recover).
    pub fn fail(&self, light: &str) {
        self.lock().failing.insert(light.to_string());
    }

    pub fn recover(&self, light: &str) {
        self.lock().failing.remove(light);
    }

    /// Flip power from outside the engine, as a wall switch would.
    /// Not recorded in the command log.
    pub fn set_power(&self, light: &str, on: bool) -> bool {
        match self.lock().lights.get_mut(light) {
            Some(state) => {
                state.on = on;
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Log the call, then apply it unless the light is unknown or failing.
    fn apply(&self, call: LightCall) -> Result<(), DispatchError> {
        let mut inner = self.lock();
        let light = call.light().to_string();
        if self.log {
            inner.calls.push(call.clone());
        }

        if inner.failing.contains(&light) {
            return Err(DispatchError::Rejected {
                light,
                reason: "device unavailable".to_string(),
            });
        }
        let Some(state) = inner.lights.get_mut(&light) else {
            return Err(DispatchError::UnknownLight(light));
        };

        match call {
            LightCall::Set { command, .. } => {
                state.on = true;
                if let Some(color) = command.color {
                    state.color = Some(color);
                    state.color_mode = color.mode();
                }
                if let Some(brightness) = command.brightness {
                    state.brightness = Some(brightness);
                }
            }
            LightCall::TurnOn { .. } => state.on = true,
            LightCall::TurnOff { .. } => state.on = false,
        }
        Ok(())
    }
}

impl LightControl for MemoryLights {
    async fn snapshot(&self, light: &str) -> Option<LightSnapshot> {
        self.state(light)
    }

    async fn is_on(&self, light: &str) -> bool {
        self.state(light).is_some_and(|s| s.on)
    }

    async fn set_light(&self, light: &str, command: LightCommand) -> Result<(), DispatchError> {
        self.delay().await;
        self.apply(LightCall::Set {
            light: light.to_string(),
            command,
        })
    }

    async fn turn_on(&self, light: &str) -> Result<(), DispatchError> {
        self.delay().await;
        self.apply(LightCall::TurnOn {
            light: light.to_string(),
        })
    }

    async fn turn_off(&self, light: &str) -> Result<(), DispatchError> {
        self.delay().await;
        self.apply(LightCall::TurnOff {
            light: light.to_string(),
        })
    }
}
