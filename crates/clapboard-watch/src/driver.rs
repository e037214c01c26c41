//! Watch-mode driver.
//!
//! Runs the initial full build, then coalesces change events over a
//! debounce window and re-runs at most one stylesheet rebuild, one script
//! rebundle, and/or one asset re-copy per burst. Rebuild failures are
//! logged and the loop keeps running; only Ctrl+C ends the process.

use std::future::Future;
use std::io;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::Receiver;

use clapboard_pipeline::SiteBuilder;

use crate::watcher::{ChangeKind, FileWatcher};

/// Quiet period after the first event of a burst before rebuilding.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Steps queued by a burst of filesystem events.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingChanges {
    pub styles: bool,
    pub scripts: bool,
    pub assets: bool,
}

impl PendingChanges {
    pub fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Styles => self.styles = true,
            ChangeKind::Scripts => self.scripts = true,
            ChangeKind::Assets => {}
        }
        // style and script sources also live in copied directories, so any
        // change refreshes the copies
        self.assets = true;
    }
}

/// Build once, then watch the project tree and rebuild on change until
/// interrupted.
pub async fn watch(builder: SiteBuilder) -> Result<()> {
    watch_until(builder, tokio::signal::ctrl_c()).await
}

/// Watch loop with an injectable shutdown future. The future is pinned and
/// polled across iterations, so a signal arriving while a rebuild runs is
/// observed on the next pass.
async fn watch_until(
    builder: SiteBuilder,
    shutdown: impl Future<Output = io::Result<()>>,
) -> Result<()> {
    let report = builder.build()?;
    tracing::info!(
        "initial build finished in {}ms, output in {}",
        report.duration_ms,
        report.output_dir.display()
    );

    let config = builder.config();
    let (_watcher, mut rx) = FileWatcher::new(&config.root, &config.out_dir)?;

    tracing::info!("watching for changes, press Ctrl+C to stop");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("build stopped");
                return Ok(());
            }
            change = rx.recv() => {
                let Some(first) = change else {
                    return Ok(());
                };
                let mut pending = PendingChanges::default();
                pending.record(first);
                drain_burst(&mut rx, &mut pending).await;
                run_pending(&builder, pending);
            }
        }
    }
}

/// Collect further events until the channel stays quiet for the debounce
/// window, folding them into the pending flags.
async fn drain_burst(rx: &mut Receiver<ChangeKind>, pending: &mut PendingChanges) {
    loop {
        match tokio::time::timeout(DEBOUNCE, rx.recv()).await {
            Ok(Some(change)) => pending.record(change),
            // channel closed or window elapsed
            Ok(None) | Err(_) => return,
        }
    }
}

/// Run the queued steps. Each failure is logged; the watch loop survives.
fn run_pending(builder: &SiteBuilder, pending: PendingChanges) {
    if pending.styles {
        tracing::info!("style sources changed, rebuilding stylesheets");
        match builder.rebuild_styles() {
            Ok(()) => tracing::info!("stylesheets rebuilt"),
            Err(e) => tracing::error!("stylesheet rebuild failed: {e}"),
        }
    }

    if pending.scripts {
        tracing::info!("script sources changed, rebundling");
        match builder.rebuild_scripts() {
            Ok(out) => tracing::info!("rebundled {} modules", out.modules),
            Err(e) => tracing::error!("script rebuild failed: {e}"),
        }
    }

    if pending.assets {
        tracing::info!("tree changed, re-copying assets");
        match builder.recopy_assets() {
            Ok(copied) => tracing::info!("copied {} files", copied),
            Err(e) => tracing::error!("asset copy failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use clapboard_pipeline::BuildConfig;
    use tempfile::tempdir;

    #[test]
    fn pending_changes_coalesce_by_kind() {
        let mut pending = PendingChanges::default();
        pending.record(ChangeKind::Styles);
        pending.record(ChangeKind::Styles);

        assert!(pending.styles);
        assert!(!pending.scripts);
        // any change also queues an asset re-copy
        assert!(pending.assets);
    }

    #[tokio::test]
    async fn drain_burst_folds_queued_events() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(10);
        tx.send(ChangeKind::Scripts).await.unwrap();
        tx.send(ChangeKind::Styles).await.unwrap();
        drop(tx);

        let mut pending = PendingChanges::default();
        drain_burst(&mut rx, &mut pending).await;

        assert!(pending.scripts);
        assert!(pending.styles);
    }

    fn scaffold_site(root: &Path) -> BuildConfig {
        fs::create_dir_all(root.join("css")).unwrap();
        fs::create_dir_all(root.join("js")).unwrap();
        fs::create_dir_all(root.join("assets")).unwrap();

        fs::write(root.join("main1.css"), ".logo { color: #111111; }\n").unwrap();
        fs::write(root.join("css/palette.css"), ".accent { color: #222222; }\n").unwrap();
        fs::write(root.join("js/main.js"), "console.log('ready');\n").unwrap();
        fs::write(root.join("index.html"), "<html></html>").unwrap();
        fs::write(root.join("assets/notes.txt"), "hello").unwrap();

        BuildConfig {
            root: root.to_path_buf(),
            pages: vec![PathBuf::from("index.html")],
            source_map: false,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn style_rebuild_updates_output_without_a_clean() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let builder = SiteBuilder::new(scaffold_site(root));

        builder.build().unwrap();
        let before = fs::read_to_string(root.join("dist/main1.css")).unwrap();
        assert!(before.contains("#111"));

        fs::write(root.join("main1.css"), ".logo { color: #333333; }\n").unwrap();

        let mut pending = PendingChanges::default();
        pending.record(ChangeKind::Styles);
        run_pending(&builder, pending);

        let after = fs::read_to_string(root.join("dist/main1.css")).unwrap();
        assert!(after.contains("#333"));
        assert!(root.join("dist/index.html").exists());
    }

    #[test]
    fn style_change_also_refreshes_copied_sources() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let builder = SiteBuilder::new(scaffold_site(root));

        builder.build().unwrap();
        fs::write(root.join("css/palette.css"), ".accent { color: #999999; }\n").unwrap();

        let mut pending = PendingChanges::default();
        pending.record(ChangeKind::Styles);
        run_pending(&builder, pending);

        // the css directory is part of the copied tree, so its raw copy
        // must track the source
        let copied = fs::read_to_string(root.join("dist/css/palette.css")).unwrap();
        assert!(copied.contains("#999999"));
    }

    #[tokio::test]
    async fn shutdown_ends_watch_cleanly_after_initial_build() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let builder = SiteBuilder::new(scaffold_site(root));

        watch_until(builder, async { Ok(()) }).await.unwrap();

        assert!(root.join("dist/main1.css").exists());
        assert!(root.join("dist/index.html").exists());
    }

    #[test]
    fn failed_rebuild_leaves_previous_output_in_place() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let builder = SiteBuilder::new(scaffold_site(root));

        builder.build().unwrap();
        let before = fs::read_to_string(root.join("dist/main1.css")).unwrap();

        fs::write(root.join("main1.css"), "this is } not css {").unwrap();

        let mut pending = PendingChanges::default();
        pending.record(ChangeKind::Styles);
        run_pending(&builder, pending);

        // stale output survives a failed rebuild
        assert_eq!(
            fs::read_to_string(root.join("dist/main1.css")).unwrap(),
            before
        );
    }
}
