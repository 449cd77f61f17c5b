pub mod catalog;
pub mod cluster;
pub mod error;
pub mod kubeconfig;
pub mod logging;
pub mod settings;
pub mod sync;

pub use catalog::{CatalogChangeEvent, CatalogEntity, CatalogRegistry, CatalogSource};
pub use cluster::{ClusterConnection, ConnectionFactory, KubeClusterFactory, SyncParams};
pub use error::{KubeSyncError, Result};
pub use kubeconfig::{parse_kubeconfig, ContextModel, KubeconfigError};
pub use settings::{SettingsError, SettingsResource, SyncSettingsSpec};
pub use sync::{
    RemovalPolicy, SyncError, SyncEvent, SyncManager, UnitOptions, WatchList, WatchListChange,
    WatchListOp,
};
