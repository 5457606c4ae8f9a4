use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationEventKind {
    Started,
    Stopped,
}

/// Lifecycle notification broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationEvent {
    pub name: String,
    pub kind: AnimationEventKind,
    pub timestamp: DateTime<Local>,
}

impl AnimationEvent {
    pub fn started(name: impl Into<String>) -> Self {
        Self::new(name, AnimationEventKind::Started)
    }

    pub fn stopped(name: impl Into<String>) -> Self {
        Self::new(name, AnimationEventKind::Stopped)
    }

    fn new(name: impl Into<String>, kind: AnimationEventKind) -> Self {
        Self {
            name: name.into(),
            kind,
            timestamp: Local::now(),
        }
    }
}

/// One running animation as seen by the activity sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAnimation {
    pub name: String,
    pub priority: i32,
    pub lights: Vec<String>,
}

/// Count of running animations plus what each one controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivitySnapshot {
    pub count: usize,
    pub animations: Vec<ActiveAnimation>,
}
