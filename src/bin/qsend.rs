//! `qsend [-m MESSAGE]... [-i FILE] URL...`

use clap::Parser;
use qtools::address;
use qtools::cli::{CommonArgs, LinkArgs};
use qtools::client::send::{self, Input, SendOptions};
use qtools::config::default_container_id;
use qtools::{notice, Error};
use std::path::PathBuf;
use std::process::ExitCode;

/// Sends messages to one or more AMQP addresses.
#[derive(Parser, Debug)]
#[command(name = "qsend", about = "Send messages to AMQP addresses")]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    /// A literal message body; may be repeated.
    #[arg(short = 'm', long = "message", value_name = "MESSAGE")]
    messages: Vec<String>,

    /// Read message bodies, one per line, from FILE instead of stdin.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    notice::init_tracing(cli.common.verbose, cli.common.quiet);

    let addresses = match cli.link.url.iter().map(|u| address::parse(u)).collect::<Result<Vec<_>, _>>() {
        Ok(addresses) => addresses,
        Err(err) => return exit_with(&err),
    };

    let input = match cli.input {
        Some(path) => Input::File(path),
        None => Input::Stdin,
    };

    let options = SendOptions {
        messages: cli.messages,
        input,
        verbose: cli.common.verbose,
        id: cli.common.id.or_else(|| Some(default_container_id("send"))),
    };

    match send::run(&addresses, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_with(&err),
    }
}

fn exit_with(err: &Error) -> ExitCode {
    tracing::error!(%err, "qsend exiting");
    ExitCode::from(err.exit_code() as u8)
}
