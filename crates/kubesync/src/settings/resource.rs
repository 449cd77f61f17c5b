//! K8s-style settings resource.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::error::{Result, SettingsError};
use crate::cluster::SyncParams;
use crate::sync::{IgnoreRules, RemovalPolicy, UnitOptions, DEFAULT_IGNORE, DEFAULT_MAX_FILE_SIZE};

/// The API version of the settings resource.
pub const API_VERSION: &str = "kubesync.io/v1";

/// The kind of the settings resource.
pub const SETTINGS_KIND: &str = "SyncSettings";

/// Metadata for a resource, following K8s conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A generic K8s-style resource wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<T> {
    /// API version, should always be `kubesync.io/v1`.
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: T,
}

impl<T> Resource<T> {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, spec: T) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: kind.into(),
            metadata: ObjectMeta::new(name),
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings for the sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettingsSpec {
    /// Files or directories to sync on startup. `~` is expanded.
    #[serde(default = "default_watch_paths")]
    pub watch_paths: Vec<String>,

    /// Local proxy port handed to every cluster connection.
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,

    /// Kubeconfigs larger than this many bytes are not read.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    #[serde(default)]
    pub removal_policy: RemovalPolicy,

    /// File name globs skipped inside watched directories.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_watch_paths() -> Vec<String> {
    vec!["~/.kube/config".to_string()]
}

fn default_proxy_port() -> u16 {
    SyncParams::default().proxy_port
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_ignore() -> Vec<String> {
    DEFAULT_IGNORE.iter().map(|p| p.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SyncSettingsSpec {
    fn default() -> Self {
        Self {
            watch_paths: default_watch_paths(),
            proxy_port: default_proxy_port(),
            max_file_size: default_max_file_size(),
            removal_policy: RemovalPolicy::default(),
            ignore: default_ignore(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl SyncSettingsSpec {
    /// Watch paths with `~` expanded.
    pub fn expanded_watch_paths(&self) -> Vec<PathBuf> {
        self.watch_paths
            .iter()
            .map(|p| super::loader::expand_tilde(p))
            .collect()
    }

    pub fn sync_params(&self) -> SyncParams {
        SyncParams {
            proxy_port: self.proxy_port,
        }
    }

    /// Per-unit options, with the ignore globs compiled.
    pub fn unit_options(&self) -> Result<UnitOptions> {
        let mut patterns = Vec::with_capacity(self.ignore.len());
        for pattern in &self.ignore {
            let compiled =
                glob::Pattern::new(pattern).map_err(|e| SettingsError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
            patterns.push(compiled);
        }

        Ok(UnitOptions {
            max_file_size: self.max_file_size,
            removal_policy: self.removal_policy,
            ignore: IgnoreRules::from_patterns(patterns),
        })
    }
}

/// The settings resource.
pub type SettingsResource = Resource<SyncSettingsSpec>;

impl Default for SettingsResource {
    fn default() -> Self {
        Resource::new(SETTINGS_KIND, "default", SyncSettingsSpec::default())
    }
}
