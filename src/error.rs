pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds the core recognises.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An address URL did not parse per the `//host:port/path` grammar.
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// The broker could not acquire its listening endpoint.
    #[error("bind failed on '{0}': {1}")]
    BindFailed(String, String),

    /// A connection dropped unexpectedly; fatal to a client, recoverable at the broker.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A link or session closed with an AMQP error condition.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The feeder reached end of input; informational, not a failure.
    #[error("input closed")]
    InputClosed,

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("AMQP: {0}")]
    Amqp(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Maps an error to a process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidAddress(_) => 2,
            _ => 1,
        }
    }
}
