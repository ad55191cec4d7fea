//! Zefest CLI Module
//! Command-line interface for inspecting and exercising the update flow

pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zefest")]
#[command(author = "Zefest Team")]
#[command(version)]
#[command(about = "Zefest client update tooling", long_about = None)]
pub struct Cli {
    /// Path to zefest.config.json (defaults are used when absent)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the persisted client store
    #[arg(short, long, global = true)]
    pub store: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tell whether one version is newer than another
    Compare {
        /// Candidate version
        candidate: String,

        /// Version to compare against
        current: String,
    },

    /// Fetch the release manifest and evaluate the update prompt
    Check {
        /// Override the current version instead of reading the installed marker
        #[arg(long)]
        current: Option<String>,

        /// Override the manifest URL
        #[arg(long)]
        manifest_url: Option<String>,
    },

    /// Run the delivery fallback chain for a package URL
    Download {
        /// Package URL
        url: String,

        /// Directory the package is saved into
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Do not launch the system opener
        #[arg(long)]
        no_open: bool,

        /// Per-method timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Only stream the package to disk, skipping the delivery chain
        #[arg(long)]
        save_only: bool,
    },

    /// Version marker management
    Markers {
        #[command(subcommand)]
        action: MarkersAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum MarkersAction {
    /// Show installed and dismissed markers
    Show,
    /// Forget both markers
    Clear,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::engine::config::CONFIG_FILE_NAME))
    }
}
