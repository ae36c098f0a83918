mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ctest_context::Engine;

use crate::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ctest_context=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let engine = Engine::open(cli.engine_config()?)?;
    cli::print_warnings(engine.warnings());

    match &cli.command {
        Commands::Functions { format } => {
            cli::list_functions(&engine, format)?;
        }
        Commands::BuildInfo => {
            cli::build_info(&engine)?;
        }
        Commands::Includes { file, format } => {
            cli::show_includes(&engine, file, format)?;
        }
        Commands::Context {
            function,
            format,
            output,
        } => {
            cli::show_context(&engine, function, format, output.as_deref())?;
        }
    }

    Ok(())
}
