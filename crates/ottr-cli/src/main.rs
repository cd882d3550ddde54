//! Ottr CLI - Headless aggregator client
//!
//! Features:
//! - Account / category / channel listing
//! - Series episode listing with metadata enrichment
//! - Stream resolution against a running backend
//! - Offline playback planning (backend selection + fallback chain)
//! - Bookmark inspection

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// Ottr CLI - IPTV aggregator browse and playback toolkit
#[derive(Parser)]
#[command(name = "ottr")]
#[command(version)]
#[command(about = "Browse an aggregator backend and resolve playback", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8888", global = true)]
    server: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "table", global = true)]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured accounts
    Accounts,

    /// List categories for an account
    Categories {
        /// Account db id
        account: String,

        /// Content mode (itv, vod, series)
        #[arg(short, long, default_value = "itv")]
        mode: String,
    },

    /// List channels/movies/series in a category
    Channels {
        /// Account db id
        account: String,

        /// Category id
        category: String,

        /// Content mode (itv, vod, series)
        #[arg(short, long, default_value = "itv")]
        mode: String,

        /// Maximum number of entries to print
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// List episodes of a series, enriched from its detail metadata
    Episodes {
        /// Account db id
        account: String,

        /// Series id
        series: String,

        /// Series display name (improves detail lookups)
        #[arg(short, long, default_value = "")]
        name: String,

        /// Only show one season
        #[arg(long)]
        season: Option<u32>,
    },

    /// Resolve a playable item to a stream URL and playback plan
    Resolve {
        /// Account db id
        account: String,

        /// Category id
        category: String,

        /// Channel db id or provider id
        channel: String,

        /// Content mode (itv, vod, series)
        #[arg(short, long, default_value = "itv")]
        mode: String,
    },

    /// Plan playback for a raw URL without contacting the backend
    Plan {
        /// Stream URL
        url: String,

        /// Assume the stream is DRM protected
        #[arg(long)]
        drm: bool,

        /// Device can play HLS natively
        #[arg(long)]
        native_hls: bool,

        /// Device has an HEVC decoder
        #[arg(long)]
        hevc: bool,
    },

    /// List server-side bookmarks
    Bookmarks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .init();

    match cli.command {
        Commands::Accounts => {
            commands::accounts(&cli.server, &cli.format).await?;
        }
        Commands::Categories { account, mode } => {
            commands::categories(&cli.server, &account, &mode, &cli.format).await?;
        }
        Commands::Channels { account, category, mode, limit } => {
            commands::channels(&cli.server, &account, &category, &mode, limit, &cli.format).await?;
        }
        Commands::Episodes { account, series, name, season } => {
            commands::episodes(&cli.server, &account, &series, &name, season, &cli.format).await?;
        }
        Commands::Resolve { account, category, channel, mode } => {
            commands::resolve(&cli.server, &account, &category, &channel, &mode, &cli.format)
                .await?;
        }
        Commands::Plan { url, drm, native_hls, hevc } => {
            commands::plan(&url, drm, native_hls, hevc, &cli.format)?;
        }
        Commands::Bookmarks => {
            commands::bookmarks(&cli.server, &cli.format).await?;
        }
    }

    Ok(())
}
