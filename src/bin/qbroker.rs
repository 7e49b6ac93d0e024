//! `qbroker DOMAIN` — a standalone AMQP 1.0 broker process.

use clap::Parser;
use qtools::broker::Broker;
use qtools::cli::CommonArgs;
use qtools::config::default_container_id;
use qtools::reactor::run_broker;
use qtools::{notice, Error};
use std::process::ExitCode;

/// A simple AMQP 1.0 message broker for testing.
#[derive(Parser, Debug)]
#[command(name = "qbroker", about = "A simple AMQP message broker for testing")]
struct Cli {
    /// The listening domain, `host:port`.
    #[arg(value_name = "DOMAIN", default_value = "localhost:5672")]
    domain: String,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    notice::init_tracing(cli.common.verbose, cli.common.quiet);

    let container_id = cli
        .common
        .id
        .clone()
        .unwrap_or_else(|| default_container_id("broker"));

    let broker = Broker::new();

    match run_broker(&cli.domain, &container_id, broker).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error_notice(&err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn error_notice(err: &Error) {
    tracing::error!(%err, "qbroker exiting");
}
