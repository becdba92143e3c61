//! docsync CLI
//!
//! Command-line tools for exercising the docsync protocol against an
//! in-process server.
//!
//! # Commands
//!
//! - `load` - Load a document and show its server state
//! - `assist` - Compute content-assist proposals at an offset

mod commands;

use clap::{Parser, Subcommand};
use commands::assist::AssistOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docsync command-line tools.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a document and show its server state
    Load {
        /// Document to load
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compute content-assist proposals
    Assist {
        /// Document to complete in
        file: PathBuf,

        /// Caret offset in bytes
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Text to type at the offset first
        #[arg(short, long)]
        insert: Option<String>,

        /// Keyword to propose (repeatable, replaces the defaults)
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,

        /// Send the full text instead of a delta
        #[arg(long)]
        full_text: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Load { file, format } => {
            commands::load::run(&file, &format)?;
        }
        Commands::Assist {
            file,
            offset,
            insert,
            keywords,
            full_text,
            format,
        } => {
            let options = AssistOptions {
                offset,
                insert,
                keywords,
                full_text,
            };
            commands::assist::run(&file, &options, &format)?;
        }
        Commands::Version => {
            println!("docsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
