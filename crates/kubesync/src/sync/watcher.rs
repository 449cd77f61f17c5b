//! Filesystem watcher for one kubeconfig path.
//!
//! Translates raw `notify` events into `added` / `changed` / `removed`
//! notifications. No debouncing is done here; consumers must tolerate
//! back-to-back events for the same file.

use std::path::{Path, PathBuf};

use glob::Pattern;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use walkdir::WalkDir;

use super::error::{Result, SyncError};

/// File name patterns skipped by default when watching a directory.
pub const DEFAULT_IGNORE: &[&str] = &["*.lock", "*.swp", "*.swx", "*.swpx", "*.bak", "*.tmp", "*~"];

/// A change to one watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The file appeared, or existed when watching started.
    Added(PathBuf),
    Changed(PathBuf),
    Removed(PathBuf),
    /// The watch itself broke; no further events follow.
    Failed(String),
}

impl WatchEvent {
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::Added(path) | WatchEvent::Changed(path) | WatchEvent::Removed(path) => {
                Some(path)
            }
            WatchEvent::Failed(_) => None,
        }
    }
}

/// Which files inside a watched directory are considered kubeconfigs.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    /// Compiles the given glob patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> std::result::Result<Self, glob::PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn from_patterns(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    /// Returns true if a file with this name should be treated as a kubeconfig.
    ///
    /// Hidden files are always skipped.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with('.') {
            return false;
        }
        !self.patterns.iter().any(|p| p.matches(name))
    }
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_IGNORE
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .collect(),
        }
    }
}

/// What a watcher is bound to.
#[derive(Debug, Clone)]
enum Scope {
    /// A single file, watched through its parent directory.
    File(PathBuf),
    /// Every accepted regular file directly inside a directory.
    Directory { root: PathBuf, rules: IgnoreRules },
}

impl Scope {
    fn admits(&self, path: &Path) -> bool {
        match self {
            Scope::File(file) => path == file,
            Scope::Directory { root, rules } => {
                path.parent() == Some(root.as_path()) && rules.accepts(path)
            }
        }
    }

    fn root(&self) -> &Path {
        match self {
            Scope::File(file) => file,
            Scope::Directory { root, .. } => root,
        }
    }

    /// Filters a classified event down to what this scope reports.
    fn route(&self, event: WatchEvent) -> Option<WatchEvent> {
        let path = event.path()?;

        if let Scope::Directory { root, .. } = self {
            if path == root {
                return match event {
                    WatchEvent::Removed(_) => Some(WatchEvent::Failed(format!(
                        "watched directory {} was removed",
                        root.display()
                    ))),
                    _ => None,
                };
            }
        }

        if !self.admits(path) {
            return None;
        }

        if matches!(event, WatchEvent::Added(_) | WatchEvent::Changed(_)) && !is_regular_file(path)
        {
            return None;
        }
        Some(event)
    }
}

/// Returns true for regular files. Symlinks are never followed.
fn is_regular_file(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            log::warn!("Skipping symlink {}", path.display());
            false
        }
        Ok(metadata) => metadata.is_file(),
        // Gone again; a removal event follows.
        Err(_) => false,
    }
}

/// Classifies a raw `notify` event into per-file watch events.
///
/// `exists` resolves ambiguous renames whose direction the platform did not report.
pub fn classify(event: &Event, exists: impl Fn(&Path) -> bool) -> Vec<WatchEvent> {
    let paths = &event.paths;
    match event.kind {
        EventKind::Create(_) => paths.iter().cloned().map(WatchEvent::Added).collect(),
        EventKind::Remove(_) => paths.iter().cloned().map(WatchEvent::Removed).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.iter().cloned().map(WatchEvent::Removed).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().cloned().map(WatchEvent::Added).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => vec![
            WatchEvent::Removed(paths[0].clone()),
            WatchEvent::Added(paths[1].clone()),
        ],
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .map(|p| {
                if exists(p) {
                    WatchEvent::Added(p.clone())
                } else {
                    WatchEvent::Removed(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => paths.iter().cloned().map(WatchEvent::Changed).collect(),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            paths.iter().cloned().map(WatchEvent::Changed).collect()
        }
        EventKind::Access(_) => Vec::new(),
        EventKind::Any | EventKind::Other => paths
            .iter()
            .filter(|p| exists(p))
            .cloned()
            .map(WatchEvent::Changed)
            .collect(),
    }
}

/// Watches one file or directory and forwards events to a channel.
pub struct PathWatcher {
    path: PathBuf,
    watcher: Option<RecommendedWatcher>,
}

impl PathWatcher {
    /// Starts watching `path`.
    ///
    /// An `Added` event is sent for every file that already exists once the
    /// watch is in place.
    pub fn start(
        path: &Path,
        rules: IgnoreRules,
        sender: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self> {
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SyncError::PathNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(SyncError::watch(path, e)),
        };
        if metadata.file_type().is_symlink() {
            return Err(SyncError::Symlink(path.to_path_buf()));
        }

        let (scope, watch_target) = if metadata.is_dir() {
            (
                Scope::Directory {
                    root: path.to_path_buf(),
                    rules,
                },
                path.to_path_buf(),
            )
        } else {
            let parent = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf();
            (Scope::File(path.to_path_buf()), parent)
        };

        let callback_scope = scope.clone();
        let callback_sender = sender.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in classify(&event, |p| p.symlink_metadata().is_ok()) {
                    if let Some(change) = callback_scope.route(change) {
                        let _ = callback_sender.send(change);
                    }
                }
            }
            Err(e) => {
                let _ = callback_sender.send(WatchEvent::Failed(e.to_string()));
            }
        })
        .map_err(|e| SyncError::watch(path, e))?;

        watcher
            .watch(&watch_target, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::watch(path, e))?;

        log::info!("Started watching {}", path.display());

        for file in existing_files(&scope) {
            let _ = sender.send(WatchEvent::Added(file));
        }

        Ok(Self {
            path: path.to_path_buf(),
            watcher: Some(watcher),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stops watching. No events are sent afterwards.
    pub fn stop(&mut self) {
        if self.watcher.take().is_some() {
            log::info!("Stopped watching {}", self.path.display());
        }
    }
}

impl Drop for PathWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Files the scope covers right now.
fn existing_files(scope: &Scope) -> Vec<PathBuf> {
    match scope {
        Scope::File(file) => {
            if is_regular_file(file) {
                vec![file.clone()]
            } else {
                Vec::new()
            }
        }
        Scope::Directory { root, rules } => WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Failed to list {}: {}", scope.root().display(), e);
                    None
                }
            })
            .filter(|entry| rules.accepts(entry.path()))
            .filter(|entry| {
                if entry.path_is_symlink() {
                    log::warn!("Skipping symlink {}", entry.path().display());
                    return false;
                }
                entry.file_type().is_file()
            })
            .map(|entry| entry.into_path())
            .collect(),
    }
}

// ============================================================================
// Tests
// ============================================================================
