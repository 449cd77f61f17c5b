//! Settings for the sync engine.
//!
//! Settings are a single K8s-style `SyncSettings` resource in YAML, with
//! environment overrides applied on top.

pub mod error;
pub mod loader;
pub mod resource;
pub mod validation;

pub use error::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, expand_tilde, load, load_file, parse_settings, CONFIG_ENV,
    PROXY_PORT_ENV,
};
pub use resource::{
    LogFormat, ObjectMeta, Resource, SettingsResource, SyncSettingsSpec, API_VERSION,
    SETTINGS_KIND,
};
pub use validation::SettingsValidator;
