pub mod color;
pub mod controller;
pub mod error;
pub mod light;
pub mod picker;
pub mod registry;
pub mod scene;
pub mod store;

// Re-exports for convenience
pub use color::{ColorMode, ColorValue};
pub use controller::{ControllerRef, ControllerState};
pub use error::{ConfigError, DispatchError, SceneError, SceneResult};
pub use light::{LightCall, LightCommand, LightControl, LightSnapshot, MemoryLights};
pub use picker::{ColorPicker, Pick};
pub use registry::{
    ActiveAnimation, ActivitySnapshot, AnimationEvent, AnimationEventKind, AnimationRegistry,
};
pub use scene::{AnimationSpec, ChangeAmount, ColorGroup, SceneLibrary, Span};
pub use store::{LightStateStore, PriorLightState, RestoreOptions, RestoreOutcome};
