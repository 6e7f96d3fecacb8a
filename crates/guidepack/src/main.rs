//! guidepack CLI - packs a static guide into one self-contained HTML file.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "guidepack")]
#[command(about = "Packs a static guide into one self-contained HTML file")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to guidepack.toml config file
    #[arg(short, long, default_value = "guidepack.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default guidepack.toml
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        yes: bool,
    },

    /// Bundle the guide into a single HTML file
    Build {
        /// Guide source directory (defaults to config or ".")
        #[arg(short, long)]
        guide: Option<PathBuf>,

        /// Output file (defaults to config or <project root>/docs/index.html)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip minification
        #[arg(long)]
        no_minify: bool,

        /// Convert images to WebP first and embed the WebP versions
        #[arg(long)]
        optimize: bool,
    },

    /// Write WebP versions of the background and avatar images
    Optimize {
        /// Guide source directory (defaults to config or ".")
        #[arg(short, long)]
        guide: Option<PathBuf>,
    },

    /// Serve the bundle with rebuild and live reload
    Dev {
        /// Port to listen on
        #[arg(short, long, default_value = "7777")]
        port: u16,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Preview the built output
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the directory of the build output)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Build {
            guide,
            output,
            no_minify,
            optimize,
        } => {
            let minify = if no_minify { Some(false) } else { None };
            commands::build::run(&cli.config, guide, output, minify, optimize).await?;
        }
        Commands::Optimize { guide } => {
            commands::optimize::run(&cli.config, guide).await?;
        }
        Commands::Dev { port, no_open } => {
            commands::dev::run(&cli.config, port, !no_open).await?;
        }
        Commands::Serve { port, dir, no_open } => {
            commands::serve::run(&cli.config, port, dir, !no_open).await?;
        }
    }

    Ok(())
}
