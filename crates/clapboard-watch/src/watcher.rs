//! Filesystem watching for rebuild-on-change.

use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Which pipeline step a filesystem change affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Stylesheet sources changed
    Styles,

    /// Script sources changed
    Scripts,

    /// Anything else under the tree changed
    Assets,
}

/// Errors from watcher setup.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to watch {path}: {source}")]
    Setup {
        path: String,
        #[source]
        source: notify::Error,
    },
}

/// Watches the project tree and forwards classified change events.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `root` recursively. Events under the output directory, VCS
    /// metadata, and dependency caches are ignored.
    ///
    /// Returns the watcher and a channel of classified changes. The watcher
    /// must be kept alive for the channel to keep producing.
    pub fn new(
        root: &Path,
        out_dir: &Path,
    ) -> Result<(Self, async_mpsc::Receiver<ChangeKind>), WatchError> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(|e| WatchError::Setup {
            path: root.display().to_string(),
            source: e,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Setup {
                path: root.display().to_string(),
                source: e,
            })?;

        // Forward events from notify's callback thread into the async loop.
        let root = root.to_path_buf();
        let out_dir = out_dir.to_path_buf();
        std::thread::spawn(move || {
            while let Ok(event) = sync_rx.recv() {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    continue;
                }

                for path in &event.paths {
                    let relative = path.strip_prefix(&root).unwrap_or(path);
                    if let Some(kind) = classify(relative, &out_dir) {
                        if async_tx.blocking_send(kind).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a root-relative path into the step it affects, or `None` for
/// ignored paths (output dir, hidden/VCS entries, dependency caches).
pub fn classify(relative: &Path, out_dir: &Path) -> Option<ChangeKind> {
    let out_head = out_dir.components().next();

    for (index, component) in relative.components().enumerate() {
        // the output directory only shadows the tree at the top level
        if index == 0 && Some(component) == out_head {
            return None;
        }
        let name = component.as_os_str().to_str().unwrap_or("");
        if name.starts_with('.') || name == "node_modules" || name == "target" {
            return None;
        }
    }

    let ext = relative.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "css" | "scss" => Some(ChangeKind::Styles),
        "js" | "mjs" => Some(ChangeKind::Scripts),
        _ => Some(ChangeKind::Assets),
    }
}
