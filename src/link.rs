//! The transport-agnostic seam between the reactor (`reactor`) and the
//! broker/client handlers (`broker`, `client`).
//!
//! `Link` and `SenderLink` exist so `Queue` and the handlers in
//! `broker.rs`/`client/*.rs` only ever touch a link through these traits,
//! letting them be driven by a real `fe2o3-amqp` connection in production
//! and by an in-process fake in unit tests.

use crate::message::Message;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier for a link, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(u64);

/// Process-unique identifier for a connection, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl LinkId {
    pub fn next() -> Self {
        LinkId(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl ConnectionId {
    pub fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A link as seen by the broker or a client handler: identity plus the
/// connection it belongs to (used to walk and reap every link on a
/// connection that has gone away).
pub trait Link: fmt::Debug + Send + Sync {
    fn id(&self) -> LinkId;
    fn connection_id(&self) -> ConnectionId;
    fn is_sender(&self) -> bool;
    fn remote_container(&self) -> String;
}

/// A sender link from the broker's point of view: a consumer.
///
/// `credit` and `send` are the only two operations `Queue::forward` needs;
/// everything else about the underlying transport is opaque here by design.
pub trait SenderLink: Link {
    /// Non-negative credit currently granted by the remote peer.
    fn credit(&self) -> u32;

    /// Hands one message to the link for transmission. Does not block and
    /// does not check credit itself — callers (`Queue::forward`) are
    /// responsible for only calling this while `credit() > 0`.
    fn send(&self, message: Message);

    /// The local source address this link was attached with.
    fn source_address(&self) -> String;
}

/// A receiver link from the broker's point of view: a producer.
pub trait ReceiverLink: Link {
    /// The local target address this link was attached with.
    fn target_address(&self) -> &str;
}
