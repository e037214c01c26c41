//! Build driver.
//!
//! Runs the full one-shot sequence (clean, styles, scripts, assets) and
//! exposes the individual steps for watch-mode rebuilds. Style and script
//! failures are logged and recorded but do not abort the build; a failure
//! in the clean or asset-copy step does.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use crate::assets::{self, AssetError, AssetSet};
use crate::scripts::{self, BundleOutput, ScriptError, ScriptOptions};
use crate::styles::{self, StyleError, StyleOptions};

/// Configuration for a site build. Defaults match the historical site
/// layout; the CLI's `site.toml` can override any of it.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Project root all other paths are relative to
    pub root: PathBuf,

    /// Output directory, relative to the root
    pub out_dir: PathBuf,

    /// Stylesheet entry file
    pub style_entry: PathBuf,

    /// Fallback directory for stylesheet `@import`s
    pub style_search_path: PathBuf,

    /// Script entry file
    pub script_entry: PathBuf,

    /// HTML pages copied into the output directory
    pub pages: Vec<PathBuf>,

    /// Asset directories copied recursively
    pub asset_dirs: Vec<PathBuf>,

    /// Minify the script bundle
    pub minify: bool,

    /// Emit a source map next to the script bundle
    pub source_map: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            out_dir: PathBuf::from("dist"),
            style_entry: PathBuf::from("main1.css"),
            style_search_path: PathBuf::from("css"),
            script_entry: PathBuf::from("js/main.js"),
            pages: vec![
                PathBuf::from("index.html"),
                PathBuf::from("prebis.html"),
                PathBuf::from("bis.html"),
            ],
            asset_dirs: vec![
                PathBuf::from("assets"),
                PathBuf::from("css"),
                PathBuf::from("js"),
            ],
            minify: true,
            source_map: true,
        }
    }
}

impl BuildConfig {
    /// Absolute (root-joined) output directory.
    pub fn out_path(&self) -> PathBuf {
        self.root.join(&self.out_dir)
    }
}

/// Outcome of one guarded build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Built,
    Failed,
}

impl StepOutcome {
    pub fn failed(self) -> bool {
        matches!(self, StepOutcome::Failed)
    }
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildReport {
    /// Stylesheet step outcome
    pub styles: StepOutcome,

    /// Script step outcome
    pub scripts: StepOutcome,

    /// Files copied by the asset step
    pub assets_copied: usize,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

/// Errors that abort a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("failed to clean {path}: {source}")]
    Clean {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Assets(#[from] AssetError),
}

/// Site builder.
pub struct SiteBuilder {
    config: BuildConfig,
}

impl SiteBuilder {
    /// Create a new site builder.
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Delete and recreate the output directory.
    pub fn clean(&self) -> Result<(), BuildError> {
        let out = self.config.out_path();

        match fs::remove_dir_all(&out) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BuildError::Clean {
                    path: out.display().to_string(),
                    source: e,
                })
            }
        }

        fs::create_dir_all(&out).map_err(|e| BuildError::Clean {
            path: out.display().to_string(),
            source: e,
        })
    }

    /// Run the full build sequence: clean, styles, scripts, assets.
    pub fn build(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();

        self.clean()?;

        tracing::info!("building stylesheets");
        let styles = match self.rebuild_styles() {
            Ok(()) => {
                tracing::info!("stylesheets built");
                StepOutcome::Built
            }
            Err(e) => {
                tracing::error!("stylesheet build failed: {e}");
                StepOutcome::Failed
            }
        };

        tracing::info!("bundling scripts");
        let scripts = match self.rebuild_scripts() {
            Ok(out) => {
                tracing::info!("bundled {} modules", out.modules);
                StepOutcome::Built
            }
            Err(e) => {
                tracing::error!("script build failed: {e}");
                StepOutcome::Failed
            }
        };

        tracing::info!("copying assets");
        let assets_copied = self.recopy_assets()?;
        tracing::info!("copied {} files", assets_copied);

        Ok(BuildReport {
            styles,
            scripts,
            assets_copied,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.out_path(),
        })
    }

    /// Run only the stylesheet step.
    pub fn rebuild_styles(&self) -> Result<(), StyleError> {
        let entry = self.config.root.join(&self.config.style_entry);
        let out_name = self
            .config
            .style_entry
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("main.css"));

        styles::build_styles(&StyleOptions {
            entry,
            search_path: self.config.root.join(&self.config.style_search_path),
            out_file: self.config.out_path().join(out_name),
        })
    }

    /// Run only the script step.
    pub fn rebuild_scripts(&self) -> Result<BundleOutput, ScriptError> {
        scripts::build_scripts(&ScriptOptions {
            root: self.config.root.clone(),
            entry: self.config.root.join(&self.config.script_entry),
            out_dir: self.config.out_path(),
            minify: self.config.minify,
            source_map: self.config.source_map,
        })
    }

    /// Run only the asset copy step.
    pub fn recopy_assets(&self) -> Result<usize, AssetError> {
        let set = AssetSet {
            pages: self.config.pages.clone(),
            dirs: self.config.asset_dirs.clone(),
        };
        assets::copy_assets(&self.config.root, &set, &self.config.out_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    /// Lay out a minimal valid site under `root`.
    fn scaffold_site(root: &Path) {
        fs::create_dir_all(root.join("css")).unwrap();
        fs::create_dir_all(root.join("js")).unwrap();
        fs::create_dir_all(root.join("assets/img")).unwrap();

        fs::write(
            root.join("main1.css"),
            "@import \"palette.css\";\nbody { margin: 0; }\n",
        )
        .unwrap();
        fs::write(root.join("css/palette.css"), ".accent { color: #123456; }\n").unwrap();
        fs::write(root.join("js/main.js"), "console.log('ready');\n").unwrap();
        fs::write(root.join("index.html"), "<html><body>home</body></html>").unwrap();
        fs::write(root.join("assets/img/logo.png"), b"\x89PNG fake bytes").unwrap();
    }

    fn config(root: &Path) -> BuildConfig {
        BuildConfig {
            root: root.to_path_buf(),
            pages: vec![PathBuf::from("index.html")],
            asset_dirs: vec![
                PathBuf::from("assets"),
                PathBuf::from("css"),
                PathBuf::from("js"),
            ],
            ..BuildConfig::default()
        }
    }

    #[test]
    fn one_shot_build_produces_complete_output() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        scaffold_site(root);

        let report = SiteBuilder::new(config(root)).build().unwrap();
        assert!(!report.styles.failed());
        assert!(!report.scripts.failed());

        let out = root.join("dist");
        assert!(out.join("main1.css").exists());
        assert!(out.join("main.js").exists());
        assert!(out.join("main.js.map").exists());
        assert!(out.join("index.html").exists());
        assert!(out.join("css/palette.css").exists());
        assert!(out.join("js/main.js").exists());

        // non-transformed files are copied byte-identically
        assert_eq!(
            fs::read(out.join("assets/img/logo.png")).unwrap(),
            fs::read(root.join("assets/img/logo.png")).unwrap()
        );
    }

    #[test]
    fn building_twice_is_idempotent() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        scaffold_site(root);

        let builder = SiteBuilder::new(config(root));
        builder.build().unwrap();
        let css_first = fs::read(root.join("dist/main1.css")).unwrap();
        let js_first = fs::read(root.join("dist/main.js")).unwrap();

        builder.build().unwrap();
        assert_eq!(fs::read(root.join("dist/main1.css")).unwrap(), css_first);
        assert_eq!(fs::read(root.join("dist/main.js")).unwrap(), js_first);
    }

    #[test]
    fn style_failure_does_not_block_scripts_or_assets() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        scaffold_site(root);
        fs::write(root.join("main1.css"), "this is } not css {").unwrap();

        let report = SiteBuilder::new(config(root)).build().unwrap();
        assert!(report.styles.failed());
        assert!(!report.scripts.failed());

        let out = root.join("dist");
        assert!(!out.join("main1.css").exists());
        assert!(out.join("main.js").exists());
        assert!(out.join("index.html").exists());
    }

    #[test]
    fn clean_removes_stale_output() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        scaffold_site(root);

        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/stale.txt"), "leftover").unwrap();

        SiteBuilder::new(config(root)).build().unwrap();
        assert!(!root.join("dist/stale.txt").exists());
    }

    #[test]
    fn missing_page_aborts_the_build() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        scaffold_site(root);
        fs::remove_file(root.join("index.html")).unwrap();

        let err = SiteBuilder::new(config(root)).build().unwrap_err();
        assert!(matches!(err, BuildError::Assets(_)));
    }
}
