//! `qreceive [-c COUNT] [--json] [--no-prefix] [-o FILE] URL...`

use clap::Parser;
use qtools::address;
use qtools::cli::{CommonArgs, LinkArgs};
use qtools::client::receive::{self, ReceiveOptions};
use qtools::config::default_container_id;
use qtools::{notice, Error};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Receives messages from one or more AMQP addresses.
#[derive(Parser, Debug)]
#[command(name = "qreceive", about = "Receive messages from AMQP addresses")]
struct Cli {
    #[command(flatten)]
    link: LinkArgs,

    /// Stop after receiving this many messages.
    #[arg(short = 'c', long = "count", value_name = "COUNT")]
    count: Option<u64>,

    /// Print each delivery as a JSON envelope instead of plain text.
    #[arg(long)]
    json: bool,

    /// Omit the `address: ` prefix from plain-text output.
    #[arg(long = "no-prefix")]
    no_prefix: bool,

    /// Write deliveries to FILE (truncated) instead of stdout.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

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

    let options = ReceiveOptions {
        count: cli.count,
        json: cli.json,
        no_prefix: cli.no_prefix,
        verbose: cli.common.verbose,
        id: cli.common.id.or_else(|| Some(default_container_id("receive"))),
    };

    let output: Box<dyn Write> = match cli.output {
        Some(path) => match std::fs::File::create(&path) {
            Ok(file) => Box::new(file),
            Err(err) => return exit_with(&Error::Io(err)),
        },
        None => Box::new(std::io::stdout()),
    };

    match receive::run(&addresses, options, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_with(&err),
    }
}

fn exit_with(err: &Error) -> ExitCode {
    tracing::error!(%err, "qreceive exiting");
    ExitCode::from(err.exit_code() as u8)
}
