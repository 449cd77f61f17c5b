//! Settings validation.

use std::str::FromStr;

use super::error::{Result, SettingsError};
use super::resource::{SettingsResource, API_VERSION, SETTINGS_KIND};

/// Collects every problem with a settings resource before reporting.
pub struct SettingsValidator {
    errors: Vec<String>,
}

impl SettingsValidator {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Validates the settings resource.
    pub fn validate(&mut self, settings: &SettingsResource) -> Result<()> {
        self.errors.clear();

        if settings.api_version != API_VERSION {
            self.errors.push(format!(
                "Settings: apiVersion must be '{}'",
                API_VERSION
            ));
        }
        if settings.kind != SETTINGS_KIND {
            self.errors
                .push(format!("Settings: kind must be '{}'", SETTINGS_KIND));
        }
        if settings.metadata.name.is_empty() {
            self.errors
                .push("Settings: metadata.name is required".to_string());
        }

        let spec = &settings.spec;

        if spec.watch_paths.is_empty() {
            self.errors
                .push("Settings: watchPaths must not be empty".to_string());
        }
        for (i, path) in spec.watch_paths.iter().enumerate() {
            if path.trim().is_empty() {
                self.errors
                    .push(format!("Settings: watchPaths[{}] is empty", i));
            }
        }

        if spec.proxy_port == 0 {
            self.errors
                .push("Settings: proxyPort must be greater than 0".to_string());
        }

        if spec.max_file_size == 0 {
            self.errors
                .push("Settings: maxFileSize must be greater than 0".to_string());
        }

        for pattern in &spec.ignore {
            if let Err(e) = glob::Pattern::new(pattern) {
                self.errors.push(format!(
                    "Settings: invalid ignore pattern '{}': {}",
                    pattern, e
                ));
            }
        }

        if log::LevelFilter::from_str(&spec.log_level).is_err() {
            self.errors.push(format!(
                "Settings: logLevel '{}' is not one of off, error, warn, info, debug, trace",
                spec.log_level
            ));
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Validation(self.errors.join("; ")))
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl Default for SettingsValidator {
    fn default() -> Self {
        Self::new()
    }
}
