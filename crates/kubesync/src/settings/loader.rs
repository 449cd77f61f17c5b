//! Settings loading from disk and environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::{Result, SettingsError};
use super::resource::{SettingsResource, API_VERSION, SETTINGS_KIND};
use super::validation::SettingsValidator;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "KUBESYNC_CONFIG";

/// Environment variable overriding `spec.proxyPort`.
pub const PROXY_PORT_ENV: &str = "KUBESYNC_PROXY_PORT";

/// Just enough of a resource to check what it is.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceHeader {
    api_version: String,
    kind: String,
}

/// Parses a settings resource from YAML content.
pub fn parse_settings(content: &str, path: &Path) -> Result<SettingsResource> {
    let header: ResourceHeader =
        serde_yaml::from_str(content).map_err(|e| SettingsError::ParseYaml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if header.api_version != API_VERSION {
        return Err(SettingsError::InvalidApiVersion {
            version: header.api_version,
            expected: API_VERSION.to_string(),
        });
    }
    if header.kind != SETTINGS_KIND {
        return Err(SettingsError::InvalidKind {
            kind: header.kind,
            expected: SETTINGS_KIND.to_string(),
        });
    }

    serde_yaml::from_str(content).map_err(|e| SettingsError::ParseYaml {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Loads, overrides and validates a settings file.
pub fn load_file(path: &Path) -> Result<SettingsResource> {
    let content = fs::read_to_string(path).map_err(|e| SettingsError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut settings = parse_settings(&content, path)?;
    apply_env_overrides(&mut settings)?;
    SettingsValidator::new().validate(&settings)?;
    log::debug!("Loaded settings '{}' from {}", settings.name(), path.display());
    Ok(settings)
}

/// Loads settings from `path`, or from `KUBESYNC_CONFIG`, or falls back to defaults.
pub fn load(path: Option<PathBuf>) -> Result<SettingsResource> {
    let path = path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    match path {
        Some(path) => load_file(&path),
        None => {
            let mut settings = SettingsResource::default();
            apply_env_overrides(&mut settings)?;
            SettingsValidator::new().validate(&settings)?;
            Ok(settings)
        }
    }
}

/// Applies environment overrides on top of loaded settings.
pub fn apply_env_overrides(settings: &mut SettingsResource) -> Result<()> {
    if let Ok(value) = std::env::var(PROXY_PORT_ENV) {
        let port = value
            .trim()
            .parse::<u16>()
            .map_err(|e| SettingsError::InvalidEnv {
                name: PROXY_PORT_ENV.to_string(),
                value: value.clone(),
                message: e.to_string(),
            })?;
        log::debug!("Proxy port overridden by {}: {}", PROXY_PORT_ENV, port);
        settings.spec.proxy_port = port;
    }
    Ok(())
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ============================================================================
// Tests
// ============================================================================
