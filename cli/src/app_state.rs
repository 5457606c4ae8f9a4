use std::sync::Arc;
use std::time::Duration;

use glimmer_core::{
    AnimationRegistry, ColorValue, LightSnapshot, MemoryLights, SceneLibrary, scene,
};

use crate::settings::CliSettings;

pub type Registry = AnimationRegistry<MemoryLights>;

pub struct AppState {
    pub settings: CliSettings,
    pub library: SceneLibrary,
    pub lights: Arc<MemoryLights>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_settings(CliSettings::load())
    }

    pub fn with_settings(settings: CliSettings) -> Self {
        let mut lights = MemoryLights::new();
        if settings.latency_ms > 0 {
            lights = lights.with_latency(Duration::from_millis(settings.latency_ms));
        }
        for light in &settings.lights {
            lights.insert(
                light.clone(),
                LightSnapshot::on_with(ColorValue::ColorTemp(2700), 180),
            );
        }
        let lights = Arc::new(lights);
        let registry = Arc::new(AnimationRegistry::new(Arc::clone(&lights)));

        let library = load_library(&settings);
        Self {
            settings,
            library,
            lights,
            registry,
        }
    }

    /// Re-read the scene directory. Returns the number of scenes loaded.
    pub fn reload(&mut self) -> usize {
        self.library = load_library(&self.settings);
        self.library.len()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn load_library(settings: &CliSettings) -> SceneLibrary {
    match scene::load_directory(&settings.scene_dir()) {
        Ok(library) => library,
        Err(e) => {
            tracing::warn!(error = %e, "No scenes loaded");
            SceneLibrary::new()
        }
    }
}
