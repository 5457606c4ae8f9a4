//! Process-wide table of running animations.
//!
//! Every operation runs under one async lock, so ownership changes are atomic
//! with respect to concurrent start/stop/add/remove calls. Paths that take a
//! light away from a controller also hold that controller's dispatch gate
//! while they restore, which keeps a late tick from overwriting the restore.

pub mod events;

#[cfg(test)]
mod registry_tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use glimmer_types::SceneConfig;
use hashbrown::HashMap;
use tokio::sync::{Mutex, broadcast};

use crate::controller::{self, AnimationController, Assignment, ControllerRef, Session};
use crate::error::{SceneError, SceneResult};
use crate::light::{LightControl, LightSnapshot};
use crate::scene::AnimationSpec;
use crate::store::{LightStateStore, RestoreOptions};

pub use events::{ActiveAnimation, ActivitySnapshot, AnimationEvent, AnimationEventKind};

/// How long stop waits for an in-flight tick before aborting it
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct RegistryInner {
    controllers: HashMap<String, AnimationController>,
    /// Light id -> owning animation name
    owners: HashMap<String, String>,
    store: LightStateStore,
}

impl RegistryInner {
    fn session(&self, name: &str) -> Option<Arc<Session>> {
        self.controllers.get(name).map(|c| Arc::clone(c.session()))
    }
}

pub struct AnimationRegistry<L: LightControl> {
    control: Arc<L>,
    inner: Mutex<RegistryInner>,
    events: broadcast::Sender<AnimationEvent>,
    next_id: AtomicU64,
    stop_timeout: Duration,
}

impl<L: LightControl> AnimationRegistry<L> {
    pub fn new(control: Arc<L>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            control,
            inner: Mutex::new(RegistryInner::default()),
            events,
            next_id: AtomicU64::new(1),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn control(&self) -> &Arc<L> {
        &self.control
    }

    /// Started/stopped notifications. Slow receivers may lag.
    pub fn subscribe(&self) -> broadcast::Receiver<AnimationEvent> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate a scene and start it.
    pub async fn start_config(&self, config: &SceneConfig) -> SceneResult<ControllerRef> {
        let spec = AnimationSpec::from_config(config)?;
        self.start(spec).await
    }

    /// Start an animation. A running animation with the same name is stopped
    /// and restored first.
    pub async fn start(&self, spec: AnimationSpec) -> SceneResult<ControllerRef> {
        let mut inner = self.inner.lock().await;

        if let Some(old) = inner.controllers.remove(&spec.name) {
            tracing::info!(name = %spec.name, "Replacing running animation");
            self.shutdown(&mut inner, old, false).await;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session::new(spec, id));
        let claimed = self.claim(&mut inner, &session, &session.spec.lights).await;
        if claimed.is_empty() {
            tracing::warn!(name = %session.name(), "No controllable lights, not starting");
            return Err(SceneError::NoLights(session.name().to_string()));
        }

        self.assign_initial(&session, &claimed).await;

        let mut controller = AnimationController::new(Arc::clone(&session));
        controller.run(Arc::clone(&self.control));
        let handle = controller.handle();
        inner
            .controllers
            .insert(session.name().to_string(), controller);

        tracing::info!(
            name = %session.name(),
            priority = session.spec.priority,
            lights = claimed.len(),
            "Animation started"
        );
        self.emit(AnimationEvent::started(session.name()));
        Ok(handle)
    }

    /// Stop one animation and restore its lights. Returns false if it was not running.
    pub async fn stop(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.controllers.remove(name) {
            Some(controller) => {
                self.shutdown(&mut inner, controller, false).await;
                true
            }
            None => {
                tracing::debug!(name, "Stop requested for unknown animation");
                false
            }
        }
    }

    /// Stop every animation. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let mut names: Vec<String> = inner.controllers.keys().cloned().collect();
        names.sort_unstable();

        let mut stopped = 0;
        for name in names {
            if let Some(controller) = inner.controllers.remove(&name) {
                self.shutdown(&mut inner, controller, false).await;
                stopped += 1;
            }
        }
        stopped
    }

    /// Take lights away from whichever animations own them. Animations left
    /// without lights stop. Returns the lights that were owned.
    pub async fn remove_lights(&self, lights: &[String], skip_restore: bool) -> Vec<String> {
        let mut inner = self.inner.lock().await;

        let mut by_owner: HashMap<String, Vec<String>> = HashMap::new();
        for light in lights {
            if let Some(owner) = inner.owners.get(light) {
                by_owner.entry(owner.clone()).or_default().push(light.clone());
            }
        }

        let mut removed = Vec::new();
        for (owner, owned) in by_owner {
            let Some(session) = inner.session(&owner) else {
                continue;
            };
            let options = RestoreOptions {
                skip_restore: skip_restore || !session.spec.restore,
                restore_power: session.spec.restore_power,
            };

            let emptied = {
                let _gate = session.gate.lock().await;
                let released = session.relinquish(&owned);
                for light in &released {
                    inner.owners.remove(light);
                    inner.store.restore(light, options, self.control.as_ref()).await;
                }
                tracing::info!(name = %owner, lights = ?released, skip_restore, "Removed lights");
                removed.extend(released);
                session.lights().is_empty()
            };

            if emptied {
                if let Some(controller) = inner.controllers.remove(&owner) {
                    tracing::info!(name = %owner, "Animation has no lights left, stopping");
                    self.shutdown(&mut inner, controller, skip_restore).await;
                }
            }
        }
        removed
    }

    /// Add lights to a running animation, chosen by name or by handle.
    ///
    /// Exactly one of `name` and `controller` must be given. Returns the lights
    /// actually added; lights held by a higher-priority animation are skipped.
    pub async fn add_lights_to_animation(
        &self,
        lights: &[String],
        name: Option<&str>,
        controller: Option<&ControllerRef>,
    ) -> SceneResult<Vec<String>> {
        let mut inner = self.inner.lock().await;

        let target = match (name, controller) {
            (Some(name), None) => name.to_string(),
            (None, Some(handle)) => inner
                .controllers
                .iter()
                .find(|(_, c)| c.session().id == handle.id())
                .map(|(name, _)| name.clone())
                .ok_or_else(|| SceneError::NotFound(handle.name().to_string()))?,
            _ => return Err(SceneError::InvalidTarget),
        };

        let session = inner
            .session(&target)
            .ok_or_else(|| SceneError::NotFound(target.clone()))?;
        if !session.is_running() {
            return Err(SceneError::NotRunning(target));
        }

        let added = self.claim(&mut inner, &session, lights).await;
        if !added.is_empty() {
            self.assign_initial(&session, &added).await;
            tracing::info!(name = %target, lights = ?added, "Added lights");
        }
        Ok(added)
    }

    /// A light was switched back on outside the engine. Its owner, if any,
    /// re-applies its animation immediately.
    pub async fn light_turned_on(&self, light: &str) -> bool {
        let inner = self.inner.lock().await;
        let Some(session) = inner.owners.get(light).and_then(|owner| inner.session(owner)) else {
            return false;
        };
        if !session.is_running() {
            return false;
        }
        tracing::debug!(name = %session.name(), light, "Owned light turned on, re-applying");
        self.assign_initial(&session, &[light.to_string()]).await;
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Names of running animations, sorted
    pub async fn list_active(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut names: Vec<String> = inner.controllers.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Every light owned by some animation, sorted
    pub async fn active_lights(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut lights: Vec<String> = inner.owners.keys().cloned().collect();
        lights.sort_unstable();
        lights
    }

    pub async fn owner_of(&self, light: &str) -> Option<String> {
        self.inner.lock().await.owners.get(light).cloned()
    }

    pub async fn get(&self, name: &str) -> Option<ControllerRef> {
        self.inner.lock().await.controllers.get(name).map(|c| c.handle())
    }

    /// Lights with a held pre-animation snapshot, sorted
    pub async fn captured(&self) -> Vec<String> {
        self.inner.lock().await.store.lights()
    }

    pub async fn activity(&self) -> ActivitySnapshot {
        let inner = self.inner.lock().await;
        let mut animations: Vec<ActiveAnimation> = inner
            .controllers
            .values()
            .map(|c| {
                let session = c.session();
                ActiveAnimation {
                    name: session.name().to_string(),
                    priority: session.spec.priority,
                    lights: session.lights(),
                }
            })
            .collect();
        animations.sort_by(|a, b| a.name.cmp(&b.name));
        ActivitySnapshot {
            count: animations.len(),
            animations,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve, arbitrate and take ownership of `lights` for `session`.
    ///
    /// Unknown lights, lights held by a higher priority and (with
    /// `ignore_off`) lights that are off are skipped. Returns the claimed ids.
    async fn claim(
        &self,
        inner: &mut RegistryInner,
        session: &Arc<Session>,
        lights: &[String],
    ) -> Vec<String> {
        let name = session.name();
        let spec = &session.spec;

        let mut claimed: Vec<(String, LightSnapshot)> = Vec::new();
        for light in lights {
            if session.owns(light) || claimed.iter().any(|(l, _)| l == light) {
                continue;
            }
            let Some(snapshot) = self.control.snapshot(light).await else {
                tracing::warn!(name, light = %light, "Unknown light, skipping");
                continue;
            };
            if let Some(owner) = inner.owners.get(light).and_then(|o| inner.session(o)) {
                if owner.spec.priority > spec.priority {
                    tracing::info!(
                        name,
                        light = %light,
                        owner = %owner.name(),
                        "Light held by a higher priority animation"
                    );
                    continue;
                }
            }
            if !snapshot.on && spec.ignore_off {
                tracing::debug!(name, light = %light, "Light is off, ignoring");
                continue;
            }
            claimed.push((light.clone(), snapshot));
        }

        let mut transfers: HashMap<String, Vec<String>> = HashMap::new();
        for (light, snapshot) in &claimed {
            inner.store.capture(light, *snapshot);
            if let Some(previous) = inner.owners.insert(light.clone(), name.to_string()) {
                if previous != name {
                    transfers.entry(previous).or_default().push(light.clone());
                }
            }
        }
        for (previous, taken) in transfers {
            tracing::info!(name, from = %previous, lights = ?taken, "Took over lights");
            self.take_from(inner, &previous, &taken).await;
        }

        for (light, snapshot) in &claimed {
            if !snapshot.on {
                if let Err(e) = self.control.turn_on(light).await {
                    tracing::warn!(name, light = %light, error = %e, "Failed to turn light on");
                }
            }
        }

        let claimed: Vec<String> = claimed.into_iter().map(|(light, _)| light).collect();
        session.assign(&claimed);
        claimed
    }

    /// Ownership transfer: the loser drops the lights without restoring and
    /// stops if that empties it.
    async fn take_from(&self, inner: &mut RegistryInner, owner: &str, lights: &[String]) {
        let Some(session) = inner.session(owner) else {
            return;
        };
        let emptied = {
            let _gate = session.gate.lock().await;
            session.relinquish(lights);
            session.lights().is_empty()
        };
        if emptied {
            if let Some(controller) = inner.controllers.remove(owner) {
                tracing::info!(name = owner, "Animation lost all lights, stopping");
                self.shutdown(inner, controller, false).await;
            }
        }
    }

    /// First assignment for lights new to `session`; always sets color.
    async fn assign_initial(&self, session: &Session, lights: &[String]) {
        let _gate = session.gate.lock().await;
        let commands = {
            let mut rng = rand::thread_rng();
            session.plan(lights, Assignment::Initial, &mut rng)
        };
        controller::dispatch(&self.control, session.name(), commands).await;
    }

    /// Halt a deregistered controller, restore or release whatever it still
    /// owned, and announce the stop.
    async fn shutdown(
        &self,
        inner: &mut RegistryInner,
        mut controller: AnimationController,
        skip_restore: bool,
    ) {
        let session = Arc::clone(controller.session());
        let lights = controller.halt(self.stop_timeout).await;
        let options = RestoreOptions {
            skip_restore: skip_restore || !session.spec.restore,
            restore_power: session.spec.restore_power,
        };

        for light in &lights {
            if inner.owners.get(light).map(String::as_str) != Some(session.name()) {
                continue;
            }
            inner.owners.remove(light);
            inner.store.restore(light, options, self.control.as_ref()).await;
        }

        tracing::info!(name = %session.name(), lights = lights.len(), "Animation stopped");
        self.emit(AnimationEvent::stopped(session.name()));
    }

    fn emit(&self, event: AnimationEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
