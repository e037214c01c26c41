//! Site configuration.
//!
//! The source file set is fixed by default (matching the historical site
//! layout) and can be overridden through an optional `site.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

use clapboard_pipeline::BuildConfig;

/// Configuration file structure (site.toml).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    site: SiteConfig,
    #[serde(default)]
    styles: StylesConfig,
    #[serde(default)]
    scripts: ScriptsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SiteConfig {
    root: String,
    out_dir: String,
    pages: Vec<String>,
    asset_dirs: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            out_dir: "dist".to_string(),
            pages: vec![
                "index.html".to_string(),
                "prebis.html".to_string(),
                "bis.html".to_string(),
            ],
            asset_dirs: vec!["assets".to_string(), "css".to_string(), "js".to_string()],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StylesConfig {
    entry: String,
    search_path: String,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: "main1.css".to_string(),
            search_path: "css".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ScriptsConfig {
    entry: String,
    minify: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: "js/main.js".to_string(),
            minify: true,
        }
    }
}

/// Load configuration from the given path if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

impl ConfigFile {
    /// Turn the file into a pipeline config. Source maps are skipped in
    /// watch mode to keep rebuilds fast.
    pub fn into_build_config(self, watch: bool) -> BuildConfig {
        BuildConfig {
            root: PathBuf::from(self.site.root),
            out_dir: PathBuf::from(self.site.out_dir),
            style_entry: PathBuf::from(self.styles.entry),
            style_search_path: PathBuf::from(self.styles.search_path),
            script_entry: PathBuf::from(self.scripts.entry),
            pages: self.site.pages.into_iter().map(PathBuf::from).collect(),
            asset_dirs: self.site.asset_dirs.into_iter().map(PathBuf::from).collect(),
            minify: self.scripts.minify,
            source_map: !watch,
        }
    }
}
