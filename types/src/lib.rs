//! Shared configuration types for glimmer scene files.
//!
//! These types mirror what users write in TOML and carry serde defaults,
//! nothing more. Validation and normalization into the engine's typed
//! model happens in `glimmer-core`.

pub mod color;
pub mod scene;

pub use color::{ColorComponents, ColorGroupConfig, ColorType};
pub use scene::{ChangeAmountConfig, NumberOrRange, SceneConfig, SceneFile};
