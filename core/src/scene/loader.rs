//! Scene file loading
//!
//! Scenes live in TOML files, any number of `[[scene]]` tables per file.
//! A directory load merges every `*.toml` file it finds; files that fail to
//! read or parse are logged and skipped so one typo does not take down the
//! whole library.

use std::fs;
use std::path::{Path, PathBuf};

use glimmer_types::{SceneConfig, SceneFile};
use hashbrown::HashMap;

use crate::error::ConfigError;

/// Named scenes loaded from disk.
#[derive(Debug, Clone, Default)]
pub struct SceneLibrary {
    scenes: HashMap<String, SceneConfig>,
}

impl SceneLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add scenes from a file, returns names that replaced an earlier scene
    pub fn add_file(&mut self, file: SceneFile) -> Vec<String> {
        let mut duplicates = Vec::new();
        for scene in file.scenes {
            if self.scenes.contains_key(&scene.name) {
                duplicates.push(scene.name.clone());
            }
            self.scenes.insert(scene.name.clone(), scene);
        }
        duplicates
    }

    pub fn get(&self, name: &str) -> Option<&SceneConfig> {
        self.scenes.get(name)
    }

    /// Scene names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scenes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Every scene as one file, sorted by name
    pub fn to_file(&self) -> SceneFile {
        let mut scenes: Vec<SceneConfig> = self.scenes.values().cloned().collect();
        scenes.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        SceneFile { scenes }
    }
}

/// Load every `*.toml` scene file in a directory.
///
/// Only a missing or unreadable directory is an error.
pub fn load_directory(dir: &Path) -> Result<SceneLibrary, ConfigError> {
    let entries = fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut library = SceneLibrary::new();
    for path in paths {
        match load_file(&path) {
            Ok(file) => {
                let duplicates = library.add_file(file);
                if !duplicates.is_empty() {
                    tracing::warn!(
                        path = %path.display(),
                        ?duplicates,
                        "Duplicate scene names, later file wins"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping scene file");
            }
        }
    }

    tracing::info!(dir = %dir.display(), scenes = library.len(), "Loaded scenes");
    Ok(library)
}

/// Load a single TOML scene file
pub fn load_file(path: &Path) -> Result<SceneFile, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save scenes to a TOML file
pub fn save_file(path: &Path, file: &SceneFile) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(file).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Default user scene directory
pub fn default_scene_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("glimmer").join("scenes"))
}
