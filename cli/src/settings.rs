use std::path::PathBuf;

use glimmer_core::scene::default_scene_dir;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "glimmer";

/// Persistent CLI settings, stored by confy under the `glimmer` app name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliSettings {
    pub scene_directory: String,
    /// Simulated lights created at startup, all on in warm white
    pub lights: Vec<String>,
    /// Delay applied to every simulated light command
    pub latency_ms: u64,
}

impl Default for CliSettings {
    fn default() -> Self {
        let scene_directory = default_scene_dir()
            .unwrap_or_else(|| PathBuf::from("scenes"))
            .to_string_lossy()
            .to_string();
        Self {
            scene_directory,
            lights: [
                "light.living_room",
                "light.kitchen",
                "light.hallway",
                "light.porch",
                "light.bedroom",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            latency_ms: 0,
        }
    }
}

impl CliSettings {
    pub fn load() -> Self {
        confy::load(APP_NAME, None).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load settings, using defaults");
            Self::default()
        })
    }

    pub fn save(&self) -> Result<(), String> {
        confy::store(APP_NAME, None, self).map_err(|e| e.to_string())
    }

    pub fn scene_dir(&self) -> PathBuf {
        PathBuf::from(&self.scene_directory)
    }
}
