//! Stylesheet build step.
//!
//! Bundles the entry stylesheet and its `@import`s, adds vendor prefixes for
//! a fixed evergreen-browser baseline, minifies, and writes the result into
//! the output directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lightningcss::bundler::{Bundler, FileProvider, SourceProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use lightningcss::targets::{Browsers, Targets};

/// Options for a stylesheet build.
#[derive(Debug, Clone)]
pub struct StyleOptions {
    /// Entry stylesheet
    pub entry: PathBuf,

    /// Fallback directory for `@import`s that do not resolve next to the
    /// importing file
    pub search_path: PathBuf,

    /// Output file
    pub out_file: PathBuf,
}

/// Errors from the stylesheet step.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error("failed to bundle {path}: {message}")]
    Bundle { path: String, message: String },

    #[error("failed to transform CSS: {0}")]
    Transform(String),

    #[error("failed to print CSS: {0}")]
    Print(String),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Resolves `@import` specifiers relative to the importing file first, then
/// against a single search path.
struct SearchPathProvider {
    inner: FileProvider,
    search_path: PathBuf,
}

impl SourceProvider for SearchPathProvider {
    type Error = io::Error;

    fn read<'a>(&'a self, file: &Path) -> Result<&'a str, Self::Error> {
        self.inner.read(file)
    }

    fn resolve(&self, specifier: &str, originating_file: &Path) -> Result<PathBuf, Self::Error> {
        let sibling = originating_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(specifier);
        if sibling.is_file() {
            return Ok(sibling);
        }

        let fallback = self.search_path.join(specifier);
        if fallback.is_file() {
            return Ok(fallback);
        }

        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("cannot resolve @import \"{specifier}\""),
        ))
    }
}

/// Browser baseline the compiled CSS targets. Versions are encoded as
/// `major << 16 | minor << 8`.
fn baseline_targets() -> Targets {
    let browsers = Browsers {
        chrome: Some(80 << 16),
        edge: Some(80 << 16),
        firefox: Some(72 << 16),
        safari: Some(13 << 16 | 1 << 8),
        ios_saf: Some(13 << 16 | 4 << 8),
        opera: Some(67 << 16),
        samsung: Some(13 << 16),
        ..Browsers::default()
    };

    Targets {
        browsers: Some(browsers),
        ..Targets::default()
    }
}

/// Bundle, prefix, minify, and write the stylesheet.
pub fn build_styles(opts: &StyleOptions) -> Result<(), StyleError> {
    let provider = SearchPathProvider {
        inner: FileProvider::new(),
        search_path: opts.search_path.clone(),
    };

    let mut bundler = Bundler::new(&provider, None, ParserOptions::default());
    let mut stylesheet = bundler
        .bundle(&opts.entry)
        .map_err(|e| StyleError::Bundle {
            path: opts.entry.display().to_string(),
            message: e.to_string(),
        })?;

    // vendor prefixing happens in the minify transform pass, not in the printer
    stylesheet
        .minify(MinifyOptions {
            targets: baseline_targets(),
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Transform(e.to_string()))?;

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            targets: baseline_targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Print(e.to_string()))?;

    if let Some(parent) = opts.out_file.parent() {
        fs::create_dir_all(parent).map_err(|e| StyleError::Write {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    fs::write(&opts.out_file, output.code.as_bytes()).map_err(|e| StyleError::Write {
        path: opts.out_file.display().to_string(),
        source: e,
    })?;

    tracing::debug!("wrote {}", opts.out_file.display());

    Ok(())
}
