//! ome-plane-io - Inspect, copy and recover OME-TIFF containers.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ome_plane_io::{
    commands,
    config::{Cli, Command},
    CommandError,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let options = cli.io.io_options();
    let result: Result<(), CommandError> = match &cli.command {
        Command::Info { path } => commands::info(path).map(|report| println!("{}", report)),
        Command::Recover { path, keep_staging } => {
            commands::recover(path, options, *keep_staging)
                .map(|_| ())
                .map_err(CommandError::from)
        }
        Command::Copy {
            source,
            destination,
        } => commands::copy(source, destination, &options)
            .map(|_| ())
            .map_err(CommandError::from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "ome_plane_io=debug"
    } else {
        "ome_plane_io=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
