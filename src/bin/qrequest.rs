//! `qrequest [-r REQUEST]... [-i FILE] URL...`

use clap::Parser;
use qtools::address;
use qtools::cli::{CommonArgs, LinkArgs};
use qtools::client::request::{self, Input, RequestOptions};
use qtools::config::default_container_id;
use qtools::{notice, Error};
use std::path::PathBuf;
use std::process::ExitCode;

/// Sends requests to one or more AMQP addresses and prints each response.
#[derive(Parser, Debug)]
#[command(name = "qrequest", about = "Send requests and print the responses")]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    /// A literal request body; may be repeated.
    #[arg(short = 'r', long = "request", value_name = "REQUEST")]
    requests: Vec<String>,

    /// Read request bodies, one per line, from FILE instead of stdin.
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

    let options = RequestOptions {
        requests: cli.requests,
        input,
        verbose: cli.common.verbose,
        id: cli.common.id.or_else(|| Some(default_container_id("request"))),
    };

    let stdout = std::io::stdout();
    match request::run(&addresses, options, stdout.lock()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_with(&err),
    }
}

fn exit_with(err: &Error) -> ExitCode {
    tracing::error!(%err, "qrequest exiting");
    ExitCode::from(err.exit_code() as u8)
}
