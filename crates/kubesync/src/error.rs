use thiserror::Error;

use crate::cluster::ConstructError;
use crate::kubeconfig::KubeconfigError;
use crate::settings::SettingsError;
use crate::sync::SyncError;

#[derive(Error, Debug)]
pub enum KubeSyncError {
    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] KubeconfigError),

    #[error("Cluster error: {0}")]
    Construct(#[from] ConstructError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Failed to install shutdown handler: {0}")]
    ShutdownHandler(#[from] ctrlc::Error),
}

pub type Result<T> = std::result::Result<T, KubeSyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: KubeSyncError = SyncError::NoRuntime.into();
        assert!(matches!(err, KubeSyncError::Sync(SyncError::NoRuntime)));
        assert_eq!(
            err.to_string(),
            "Sync error: Sync requires a running tokio runtime"
        );

        let err: KubeSyncError = SettingsError::Validation("bad".to_string()).into();
        assert!(err.to_string().starts_with("Settings error:"));
    }
}
