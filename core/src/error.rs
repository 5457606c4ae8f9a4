use std::path::PathBuf;

pub type SceneResult<T> = Result<T, SceneError>;

/// Errors surfaced by the animation command surface.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Malformed scene; the animation does not begin.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("animation '{0}' is not running")]
    NotFound(String),

    #[error("exactly one of an animation name or a controller must be given")]
    InvalidTarget,

    #[error("animation '{0}' has no lights it can control")]
    NoLights(String),

    #[error("animation '{0}' is stopping and cannot accept lights")]
    NotRunning(String),
}

impl SceneError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// A single light update failed. Logged and skipped, never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("light {0} is not known to the light controller")]
    UnknownLight(String),

    #[error("light {light} rejected the command: {reason}")]
    Rejected { light: String, reason: String },
}

/// Errors that can occur while loading scene files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Serialize error for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
}
