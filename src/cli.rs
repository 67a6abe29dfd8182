use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resolve panoramic VR pages into portable download manifests
#[derive(Parser)]
#[command(name = "panograb")]
#[command(about = "Resolve VR scene pages into base-relative work manifests", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Record database URL, overrides the config file
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which site variant a URL belongs to
    Classify {
        url: String,
    },
    /// Resolve a page into its work manifest
    Resolve {
        url: String,
        /// Write the manifest to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the page title
    Title {
        url: String,
    },
    /// List the assets a manifest file downloads
    Plan {
        manifest: PathBuf,
    },
    /// Show the download history
    History {
        /// Drop an entry instead of listing
        #[arg(short, long)]
        remove: Option<String>,
    },
    /// Show or set the download directory
    Dir {
        path: Option<String>,
    },
}
