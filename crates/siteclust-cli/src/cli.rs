use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "siteclust", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster candidate sites into representative resource groups
    Run {
        /// Site table (CSV or Parquet)
        #[arg(long, value_hint = ValueHint::FilePath)]
        sites: PathBuf,
        /// Settings file (YAML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        settings: PathBuf,
        /// Wide profile table; overrides `profiles` in the settings file
        #[arg(long, value_hint = ValueHint::FilePath)]
        profiles: Option<PathBuf>,
        /// Site id to profile key map; overrides `site_map` in the settings file
        #[arg(long, value_hint = ValueHint::FilePath)]
        site_map: Option<PathBuf>,
        /// Labelled site table; one file per group when the settings hold several
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// One row per cluster (groups with `aggregate` only)
        #[arg(long, value_hint = ValueHint::FilePath)]
        summary_out: Option<PathBuf>,
        /// Aggregated profiles, one column per cluster
        #[arg(long, value_hint = ValueHint::FilePath)]
        profiles_out: Option<PathBuf>,
        /// Degraded-mode warnings of every group as JSON
        #[arg(long, value_hint = ValueHint::FilePath)]
        diagnostics_out: Option<PathBuf>,
        /// Threading hint (`auto` or integer)
        #[arg(long, default_value = "auto")]
        threads: String,
    },
    /// Summarize available capacity per region and cost band
    Summary {
        /// Site table (CSV or Parquet)
        #[arg(long, value_hint = ValueHint::FilePath)]
        sites: PathBuf,
        /// Output table (CSV or Parquet)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Comma-separated band edges (default 0,10,...,100,125,150,175,200,5000)
        #[arg(long)]
        edges: Option<String>,
    },
    /// Check a settings file without running it
    Validate {
        /// Settings file (YAML or JSON)
        #[arg(long, value_hint = ValueHint::FilePath)]
        settings: PathBuf,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
