// src/config/mod.rs

//! TOML panel file: model, loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_base_dir, default_config_path, load_and_validate, load_from_path, resolve_workflows};
pub use model::{EngineSection, PanelFile, RawPanelFile, TaskSection, WorkflowSection};
