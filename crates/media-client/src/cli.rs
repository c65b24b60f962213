use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mediadeck")]
#[command(about = "Browse a media server's catalog and play its HLS streams", version)]
pub struct Cli {
    /// Config file [default: ~/.config/mediadeck/config.toml]
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override `client.base_url`
    #[arg(short, long, value_name = "URL")]
    pub server: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Server health
    Status,
    /// List the catalog with summary statistics
    List {
        /// Case-insensitive filename/format filter
        #[arg(short = 'q', long)]
        search: Option<String>,
    },
    /// Full details for one media file
    Show { id: String },
    /// Ask the server to rescan its library
    Scan,
    /// Prepare a stream and play it in mpv
    Play {
        id: String,
        /// Use the legacy direct session instead of HLS
        #[arg(long)]
        direct: bool,
    },
    /// Show or change client preferences
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    Get { key: String },
    Set { key: String, value: String },
}
