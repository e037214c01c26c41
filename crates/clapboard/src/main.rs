//! Clapboard CLI - static-site asset pipeline.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use clapboard_pipeline::SiteBuilder;

mod config;

#[derive(Parser)]
#[command(name = "clapboard")]
#[command(about = "Static-site asset pipeline: styles, scripts, and asset copying")]
#[command(version)]
pub struct Cli {
    /// Rebuild on file change instead of exiting after one build
    #[arg(long)]
    watch: bool,

    /// Path to site.toml config file
    #[arg(short, long, default_value = "site.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let file_config = config::load(&cli.config)?;
    let builder = SiteBuilder::new(file_config.into_build_config(cli.watch));

    if cli.watch {
        clapboard_watch::watch(builder).await?;
    } else {
        let report = builder.build()?;
        tracing::info!(
            "build finished in {}ms, output in {}",
            report.duration_ms,
            report.output_dir.display()
        );
        if report.styles.failed() || report.scripts.failed() {
            tracing::warn!("one or more build steps failed, see errors above");
        }
    }

    Ok(())
}
