//! Build pipeline for the clapboard static-site tool.
//!
//! Compiles stylesheets, bundles the browser script, and copies HTML pages
//! and asset directories into a distributable output tree.

pub mod assets;
pub mod builder;
pub mod scripts;
pub mod styles;

pub use builder::{BuildConfig, BuildError, BuildReport, SiteBuilder, StepOutcome};
