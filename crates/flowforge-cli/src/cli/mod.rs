//! CLI command definitions for the `flowforge` binary.

pub mod catalog;
pub mod generate;
pub mod render;
pub mod run;
pub mod validate;
pub mod workflows;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Generate, validate, and simulate onboarding workflow DAGs.
#[derive(Parser)]
#[command(name = "flowforge", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory (defaults to ~/.flowforge).
    #[arg(long, global = true, env = "FLOWFORGE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Team whose workflows are read and written.
    #[arg(long, global = true, env = "FLOWFORGE_TEAM", default_value = "default")]
    pub team: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a workflow JSON file against the schema and capability catalog.
    Validate {
        /// Path to the workflow JSON file.
        file: PathBuf,
    },

    /// Execute a workflow JSON file against the simulated services.
    Run {
        /// Path to the workflow JSON file.
        file: PathBuf,

        /// Seed for failure injection (overrides config.toml).
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Generate a workflow from a request, repairing it until it runs clean.
    Generate(GenerateArgs),

    /// List stored workflows for the team.
    #[command(alias = "ls")]
    List,

    /// Show a stored workflow.
    Show {
        /// Workflow ID.
        id: String,

        /// Specific stored version (defaults to latest).
        #[arg(long, value_name = "VERSION")]
        rev: Option<u32>,
    },

    /// Delete every version of a stored workflow.
    #[command(alias = "rm")]
    Delete {
        /// Workflow ID.
        id: String,
    },

    /// List the services and actions workflows may use.
    Catalog {
        /// Only show one service (hr, google, slack, jira, github).
        #[arg(long)]
        service: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Args)]
pub struct GenerateArgs {
    /// What the workflow should do, in plain language.
    pub request: String,

    /// Extra context for the generator (names, dates, team conventions).
    #[arg(long)]
    pub context: Option<String>,

    /// Modify a stored workflow instead of creating a new one.
    #[arg(long, value_name = "ID")]
    pub modify: Option<String>,

    /// Do not store the accepted workflow.
    #[arg(long)]
    pub no_save: bool,

    /// Correction retries after the first attempt (overrides config.toml).
    #[arg(long)]
    pub max_fix_attempts: Option<u32>,
}

/// Output mode shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    /// Styled text is wanted.
    pub fn human(&self) -> bool {
        !self.json && !self.quiet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from([
            "flowforge",
            "--team",
            "engineering",
            "generate",
            "Onboard Alice",
            "--modify",
            "day1-onboarding",
            "--no-save",
        ])
        .unwrap();
        assert_eq!(cli.team, "engineering");
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.request, "Onboard Alice");
                assert_eq!(args.modify.as_deref(), Some("day1-onboarding"));
                assert!(args.no_save);
                assert!(args.max_fix_attempts.is_none());
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["flowforge", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn test_show_specific_revision() {
        let cli = Cli::try_parse_from(["flowforge", "show", "day1-onboarding", "--rev", "2"]).unwrap();
        match cli.command {
            Commands::Show { id, rev } => {
                assert_eq!(id, "day1-onboarding");
                assert_eq!(rev, Some(2));
            }
            _ => panic!("expected show"),
        }
    }
}
