//! CLI command definitions for the `lp` binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lp - linked panels layout checker
#[derive(Parser)]
#[command(
    name = "lp",
    about = "Validate and inspect linked panel layouts",
    version,
    after_help = "Set RUST_LOG to control log filtering (logs go to stderr)"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Validate a layout file and report issues
    Check {
        /// Layout file (.json, .yaml or .yml)
        layout: PathBuf,
    },

    /// Show panels, their resources and what each panel shows first
    Show {
        /// Layout file (.json, .yaml or .yml)
        layout: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for the show command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
