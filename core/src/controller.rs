//! Per-animation session state and the periodic tick loop.
//!
//! A [`Session`] is shared between the registry and the controller's task.
//! Membership changes are made by the registry while it holds the session's
//! dispatch gate; the tick loop holds the same gate for the whole of a
//! tick's dispatch, so a light is never written by a tick after it has been
//! taken away or restored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hashbrown::HashMap;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use crate::light::{LightCommand, LightControl};
use crate::picker::ColorPicker;
use crate::scene::AnimationSpec;

/// Floor for a drawn tick interval; a zero frequency would otherwise spin
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// Whether an assignment is the first one a light receives from a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Assignment {
    /// Color always applied
    Initial,
    Tick,
}

#[derive(Debug, Clone, Copy, Default)]
struct LightCursor {
    sequence: usize,
    last_group: Option<usize>,
}

#[derive(Debug)]
struct SessionState {
    lights: Vec<String>,
    cursors: HashMap<String, LightCursor>,
    state: ControllerState,
}

#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) spec: AnimationSpec,
    pub(crate) id: u64,
    state: Mutex<SessionState>,
    /// Held for the duration of a dispatch
    pub(crate) gate: tokio::sync::Mutex<()>,
}

impl Session {
    pub(crate) fn new(spec: AnimationSpec, id: u64) -> Self {
        Self {
            spec,
            id,
            state: Mutex::new(SessionState {
                lights: Vec::new(),
                cursors: HashMap::new(),
                state: ControllerState::Starting,
            }),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn name(&self) -> &str {
        &self.spec.name
    }

    pub(crate) fn state(&self) -> ControllerState {
        self.lock().state
    }

    pub(crate) fn set_state(&self, state: ControllerState) {
        self.lock().state = state;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    pub(crate) fn lights(&self) -> Vec<String> {
        self.lock().lights.clone()
    }

    pub(crate) fn owns(&self, light: &str) -> bool {
        self.lock().lights.iter().any(|l| l == light)
    }

    /// Add lights to the owned set, skipping ones already owned.
    pub(crate) fn assign(&self, lights: &[String]) {
        let mut inner = self.lock();
        for light in lights {
            if !inner.lights.contains(light) {
                inner.lights.push(light.clone());
            }
        }
    }

    /// Drop `lights` from the owned set. Returns the ones that were owned.
    pub(crate) fn relinquish(&self, lights: &[String]) -> Vec<String> {
        let mut inner = self.lock();
        let mut removed = Vec::new();
        inner.lights.retain(|light| {
            if lights.contains(light) {
                removed.push(light.clone());
                false
            } else {
                true
            }
        });
        for light in &removed {
            inner.cursors.remove(light);
        }
        removed
    }

    /// Empty the owned set.
    pub(crate) fn drain(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.cursors.clear();
        std::mem::take(&mut inner.lights)
    }

    /// Pick this tick's lights from `candidates` without replacement.
    pub(crate) fn choose<R: Rng + ?Sized>(
        &self,
        candidates: &[String],
        rng: &mut R,
    ) -> Vec<String> {
        let amount = self.spec.change_amount.sample(candidates.len(), rng);
        candidates.choose_multiple(rng, amount).cloned().collect()
    }

    /// Build one command per light that has something to change.
    pub(crate) fn plan<R: Rng + ?Sized>(
        &self,
        lights: &[String],
        assignment: Assignment,
        rng: &mut R,
    ) -> Vec<(String, LightCommand)> {
        let picker = ColorPicker::new(&self.spec.colors, self.spec.brightness);
        let mut inner = self.lock();
        let mut commands = Vec::with_capacity(lights.len());
        for light in lights {
            let cursor = inner.cursors.entry_ref(light.as_str()).or_default();
            if let Some(command) = plan_light(&self.spec, &picker, cursor, assignment, rng) {
                commands.push((light.clone(), command));
            }
        }
        commands
    }
}

fn plan_light<R: Rng + ?Sized>(
    spec: &AnimationSpec,
    picker: &ColorPicker<'_>,
    cursor: &mut LightCursor,
    assignment: Assignment,
    rng: &mut R,
) -> Option<LightCommand> {
    let last_group = cursor.last_group.and_then(|g| picker.group(g));

    let (change_color, change_brightness) = match assignment {
        Assignment::Initial => (
            true,
            spec.animate_brightness || spec.brightness.is_some_and(|b| b.is_fixed()),
        ),
        Assignment::Tick => {
            // Split only when a brightness can be drawn
            let one_change = last_group.is_some_and(|g| {
                g.one_change_per_tick && (g.brightness.is_some() || spec.brightness.is_some())
            });
            match (spec.animate_color, spec.animate_brightness) {
                (true, true) if one_change => {
                    if rng.gen_bool(0.5) {
                        (true, false)
                    } else {
                        (false, true)
                    }
                }
                flags => flags,
            }
        }
    };
    if !change_color && !change_brightness {
        return None;
    }

    let transition = spec.transition.sample(rng);

    if !change_color {
        // Brightness only: stay on the current group
        let group = match last_group {
            Some(group) => group,
            None => picker.group(picker.weighted_index(rng)?)?,
        };
        let brightness = picker.pick_brightness(group, rng)?;
        return Some(LightCommand {
            color: None,
            brightness: Some(brightness),
            transition,
        });
    }

    let pick = picker.pick(spec.change_sequence.then_some(cursor.sequence), rng)?;
    if let Some(next) = pick.next_cursor {
        cursor.sequence = next;
    }
    cursor.last_group = Some(pick.group);

    Some(LightCommand {
        color: Some(pick.color),
        brightness: if change_brightness { pick.brightness } else { None },
        transition,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only handle to a running animation.
#[derive(Debug, Clone)]
pub struct ControllerRef {
    session: Arc<Session>,
}

impl ControllerRef {
    pub fn name(&self) -> &str {
        self.session.name()
    }

    pub fn priority(&self) -> i32 {
        self.session.spec.priority
    }

    pub fn state(&self) -> ControllerState {
        self.session.state()
    }

    pub fn lights(&self) -> Vec<String> {
        self.session.lights()
    }

    pub fn spec(&self) -> &AnimationSpec {
        &self.session.spec
    }

    pub(crate) fn id(&self) -> u64 {
        self.session.id
    }
}

pub(crate) struct AnimationController {
    session: Arc<Session>,
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl AnimationController {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            session,
            cancel,
            task: None,
        }
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) fn handle(&self) -> ControllerRef {
        ControllerRef {
            session: Arc::clone(&self.session),
        }
    }

    /// Move to `Running` and spawn the tick loop when the animation has a
    /// change frequency. Only valid from `Starting`.
    pub(crate) fn run<L: LightControl>(&mut self, control: Arc<L>) {
        if self.session.state() != ControllerState::Starting {
            tracing::warn!(name = %self.session.name(), "Controller already started");
            return;
        }
        self.session.set_state(ControllerState::Running);

        if self.session.spec.is_one_shot() {
            tracing::debug!(name = %self.session.name(), "One-shot animation applied");
            return;
        }
        let cancel = self.cancel.subscribe();
        self.task = Some(tokio::spawn(tick_loop(
            Arc::clone(&self.session),
            control,
            cancel,
        )));
    }

    /// Cancel the loop, wait for in-flight dispatches and empty the owned set.
    ///
    /// Returns the lights the session still owned. If the gate is not free
    /// within `timeout` the task is aborted.
    pub(crate) async fn halt(&mut self, timeout: Duration) -> Vec<String> {
        self.session.set_state(ControllerState::Stopping);
        self.cancel.send_replace(true);

        let lights = match tokio::time::timeout(timeout, self.session.gate.lock()).await {
            Ok(_gate) => self.session.drain(),
            Err(_) => {
                tracing::warn!(
                    name = %self.session.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    "In-flight updates did not settle, aborting tick loop"
                );
                if let Some(task) = &self.task {
                    task.abort();
                }
                self.session.drain()
            }
        };

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!(name = %self.session.name(), error = %e, "Tick loop panicked");
                }
            }
        }

        self.session.set_state(ControllerState::Stopped);
        lights
    }
}

async fn tick_loop<L: LightControl>(
    session: Arc<Session>,
    control: Arc<L>,
    mut cancel: watch::Receiver<bool>,
) {
    let Some(frequency) = session.spec.change_frequency else {
        return;
    };
    tracing::debug!(name = %session.name(), "Tick loop started");

    loop {
        let wait = Duration::from_secs_f64(frequency.sample(&mut rand::thread_rng()))
            .max(MIN_TICK_INTERVAL);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.changed() => break,
        }

        let _gate = session.gate.lock().await;
        if *cancel.borrow() || !session.is_running() {
            break;
        }

        let owned = session.lights();
        if owned.is_empty() {
            break;
        }

        let candidates = if session.spec.ignore_off {
            let mut on = Vec::with_capacity(owned.len());
            for light in owned {
                if control.is_on(&light).await {
                    on.push(light);
                }
            }
            on
        } else {
            owned
        };

        let commands = {
            let mut rng = rand::thread_rng();
            let chosen = session.choose(&candidates, &mut rng);
            session.plan(&chosen, Assignment::Tick, &mut rng)
        };
        if commands.is_empty() {
            continue;
        }

        dispatch(&control, session.name(), commands).await;
    }

    tracing::debug!(name = %session.name(), "Tick loop finished");
}

/// Send every command concurrently and wait for all of them.
///
/// Failures are logged and skipped. Returns the number of failed lights.
pub(crate) async fn dispatch<L: LightControl>(
    control: &Arc<L>,
    name: &str,
    commands: Vec<(String, LightCommand)>,
) -> usize {
    let mut set = JoinSet::new();
    for (light, command) in commands {
        let control = Arc::clone(control);
        set.spawn(async move {
            let result = control.set_light(&light, command).await;
            (light, result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((light, Err(e))) => {
                failures += 1;
                tracing::warn!(name, light = %light, error = %e, "Light update failed");
            }
            Err(e) => {
                failures += 1;
                tracing::warn!(name, error = %e, "Light update task failed");
            }
        }
    }
    failures
}
