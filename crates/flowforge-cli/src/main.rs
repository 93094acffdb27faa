//! FlowForge CLI entry point.
//!
//! Binary name: `flowforge`
//!
//! Parses CLI arguments, loads configuration and the workflow store, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,flowforge=debug",
        _ => "trace",
    };
    flowforge_observe::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "flowforge", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(cli.data_dir.clone()).await?;
    let out = cli::Output {
        json: cli.json,
        quiet: cli.quiet,
    };
    let team = cli.team.as_str();

    let result = match cli.command {
        Commands::Validate { file } => cli::validate::validate(&file, out).await,
        Commands::Run { file, seed } => cli::run::run(&state, &file, seed, out).await,
        Commands::Generate(args) => cli::generate::generate(&state, args, team, out).await,
        Commands::List => cli::workflows::list(&state, team, out).await,
        Commands::Show { id, rev } => cli::workflows::show(&state, team, &id, rev, out).await,
        Commands::Delete { id } => cli::workflows::delete(&state, team, &id, out).await,
        Commands::Catalog { service } => cli::catalog::catalog(service.as_deref(), out),
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    flowforge_observe::shutdown_tracing();
    result
}
