use std::{io, process};

use catalog_cache::{
    cache::{CacheConfig, TieredCache},
    commands,
    config::{self, Command},
    error::AppError,
    infra::telemetry,
};
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let cache = match &cli_args.command {
        // Fingerprinting never touches the store.
        Command::Fingerprint(_) => TieredCache::local_only(&CacheConfig::from(&settings.cache)),
        _ => TieredCache::connect(&CacheConfig::from(&settings.cache)).await,
    };

    let mut stdout = io::stdout().lock();
    commands::execute(&cache, cli_args.command, &mut stdout).await
}
