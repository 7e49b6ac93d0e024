//! Shared CLI flags, composed into each binary via `clap`'s
//! `#[command(flatten)]`.

use clap::Args;

/// Flags shared by every binary.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Raise logging verbosity to debug.
    #[arg(long)]
    pub verbose: bool,

    /// Lower logging verbosity to warnings and above.
    #[arg(long)]
    pub quiet: bool,

    /// Override the AMQP container-id for this run.
    #[arg(long)]
    pub id: Option<String>,
}

/// Flags shared by the multi-URL link clients (`qreceive`, `qrequest`;
/// `qsend` also takes multiple URLs but has no further link-specific flags
/// beyond what `CommonArgs` already covers).
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// One or more address URLs.
    #[arg(value_name = "ADDRESS-URL", required = true)]
    pub url: Vec<String>,
}
