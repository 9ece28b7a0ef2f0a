mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a portal session
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "one2track", &mut std::io::stdout());
            Ok(())
        }

        // Install resolves its own credentials and may prompt for them
        Command::Install(args) => commands::install::handle(args, &cli.global).await,

        Command::Devices(args) => {
            let (client, _) = config::build_client_config(&cli.global)?;
            tracing::debug!(?args, "fetching devices");
            commands::devices::handle(args, client, &cli.global).await
        }

        Command::Watch(args) => {
            let (client, interval) = config::build_client_config(&cli.global)?;
            tracing::debug!(?args, "starting watch");
            commands::watch::handle(args, client, interval, &cli.global).await
        }
    }
}
