//! Defaults shared by the address parser, the CLI layer and the container id.

/// Host assumed when an address omits an authority.
pub const DEFAULT_HOST: &str = "localhost";

/// Port assumed when an address omits an authority.
pub const DEFAULT_PORT: u16 = 5672;

/// Builds a default container id of the form `qtools-<role>-<pid>`, the
/// per-run container identity used as the AMQP `container-id` unless
/// `--id` overrides it.
pub fn default_container_id(role: &str) -> String {
    format!("qtools-{role}-{}", std::process::id())
}
