use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use kubesync::catalog::{CatalogChangeEvent, CatalogRegistry};
use kubesync::cluster::KubeClusterFactory;
use kubesync::settings::{self, SettingsResource};
use kubesync::sync::{SyncManager, WatchList};
use kubesync::{logging, KubeSyncError, Result};

fn main() -> ExitCode {
    let settings_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = match settings::load(settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("kubesync: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_from_settings(&settings.spec);

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(settings: SettingsResource) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let registry = Arc::new(CatalogRegistry::new());
        let manager = SyncManager::new(
            Arc::clone(&registry),
            Arc::new(KubeClusterFactory::new()),
            settings.spec.unit_options()?,
        );
        let watch_list = WatchList::with_paths(settings.spec.expanded_watch_paths());

        let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel();
        ctrlc::set_handler(move || {
            let _ = shutdown_tx.send(());
        })?;

        let mut changes = registry.subscribe();
        let mut sync_events = manager.subscribe();
        manager.start_sync(&watch_list, settings.spec.sync_params())?;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    log::info!("Shutting down");
                    break;
                }
                change = changes.recv() => match change {
                    Ok(change) => log_catalog(&registry, &change),
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("Missed {} catalog change(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                Ok(event) = sync_events.recv() => {
                    if let Ok(json) = serde_json::to_string(&event) {
                        log::debug!("Sync event: {}", json);
                    }
                }
            }
        }

        manager.stop_sync();
        Ok::<(), KubeSyncError>(())
    })
}

fn log_catalog(registry: &CatalogRegistry, change: &CatalogChangeEvent) {
    let items = registry.items();
    log::info!(
        "Catalog changed ({}), {} cluster(s)",
        change.source_id(),
        items.len()
    );
    for entity in &items {
        log::info!(
            "  {} -> {} [{}]",
            entity.name(),
            entity.spec.api_url.as_deref().unwrap_or("<no endpoint>"),
            entity.source_file().unwrap_or("?")
        );
    }
}
