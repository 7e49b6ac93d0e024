//! The broker handler: owns the queue registry and reacts to link and
//! connection lifecycle events.
//! Transport-agnostic: it only ever touches a link through the [`SenderLink`]
//! / [`ReceiverLink`] traits in `link.rs`, so the same handler drives both
//! the real `fe2o3-amqp`-backed reactor and the in-process test harness.

use crate::link::{ConnectionId, Link, LinkId, ReceiverLink, SenderLink};
use crate::message::Message;
use crate::queue::Queue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Outcome of an attaching sender (consumer) link: the address the broker
/// assigned, which may have been synthesised for a dynamic source.
pub struct ConsumerAttach {
    pub address: String,
}

/// Registry of named queues plus a connection→sender-links index used to
/// reap every consumer registration when a connection goes away.
pub struct Broker {
    queues: Mutex<HashMap<String, Queue>>,
    connections: Mutex<HashMap<ConnectionId, Vec<Arc<dyn SenderLink>>>>,
}

impl Broker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
        })
    }

    fn with_queue<R>(&self, address: &str, f: impl FnOnce(&mut Queue) -> R) -> R {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues
            .entry(address.to_string())
            .or_insert_with(|| Queue::new(address));
        f(queue)
    }

    /// Sender (consumer) attach: assigns the source address (synthesising a
    /// UUID for a dynamic source) and registers the link as a consumer of
    /// the matching queue.
    pub fn on_sender_opening(&self, link: Arc<dyn SenderLink>, dynamic: bool) -> ConsumerAttach {
        let address = if dynamic {
            Uuid::new_v4().to_string()
        } else {
            link.source_address()
        };

        self.with_queue(&address, |queue| queue.add_consumer(link.clone()));

        self.connections
            .lock()
            .unwrap()
            .entry(link.connection_id())
            .or_default()
            .push(link);

        ConsumerAttach { address }
    }

    /// Receiver (producer) attach: no queue is created here; it is created
    /// lazily on first delivery.
    pub fn on_receiver_opening(&self, _link: &dyn ReceiverLink) {}

    /// Sender detach: removes this consumer from its queue. Idempotent.
    pub fn on_sender_closing(&self, link: &dyn SenderLink) {
        self.with_queue(&link.source_address(), |queue| queue.remove_consumer(link.id()));
        self.forget(link.connection_id(), link.id());
    }

    /// Receiver detach requires no state change.
    pub fn on_receiver_closing(&self, _link: &dyn ReceiverLink) {}

    /// A delivery arrived on a receiver link targeting `address`: store then
    /// fan out to every consumer of that queue.
    pub fn on_message(&self, address: &str, message: Message) {
        self.with_queue(address, |queue| {
            queue.store_message(message);
            queue.forward_to_all();
        });
    }

    /// A sender link reports fresh credit: drain that link only against its
    /// queue.
    pub fn on_sendable(&self, link: &dyn SenderLink) {
        self.with_queue(&link.source_address(), |queue| queue.forward(link));
    }

    /// Connection loss or orderly close: remove every sender link of this
    /// connection from its queue's consumers. Queues and their pending
    /// messages persist.
    pub fn on_connection_gone(&self, connection_id: ConnectionId) {
        let links = self
            .connections
            .lock()
            .unwrap()
            .remove(&connection_id)
            .unwrap_or_default();

        for link in links {
            self.with_queue(&link.source_address(), |queue| queue.remove_consumer(link.id()));
        }
    }

    fn forget(&self, connection_id: ConnectionId, link_id: LinkId) {
        if let Some(links) = self.connections.lock().unwrap().get_mut(&connection_id) {
            links.retain(|l| l.id() != link_id);
        }
    }

    #[cfg(test)]
    pub fn queue_len(&self, address: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(address)
            .map(Queue::len)
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn consumer_count(&self, address: &str) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(address)
            .map(Queue::consumer_count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ConnectionId as CId, Link as LinkTrait, LinkId as LId};
    use std::sync::Mutex as StdMutex;

    #[derive(Debug)]
    struct FakeSender {
        id: LId,
        connection_id: CId,
        credit: StdMutex<u32>,
        sent: StdMutex<Vec<Message>>,
        source: String,
    }

    impl FakeSender {
        fn new(connection_id: CId, source: &str, credit: u32) -> Arc<Self> {
            Arc::new(Self {
                id: LId::next(),
                connection_id,
                credit: StdMutex::new(credit),
                sent: StdMutex::new(Vec::new()),
                source: source.to_string(),
            })
        }
    }

    impl LinkTrait for FakeSender {
        fn id(&self) -> LId {
            self.id
        }
        fn connection_id(&self) -> CId {
            self.connection_id
        }
        fn is_sender(&self) -> bool {
            true
        }
        fn remote_container(&self) -> String {
            "peer".to_string()
        }
    }

    impl SenderLink for FakeSender {
        fn credit(&self) -> u32 {
            *self.credit.lock().unwrap()
        }
        fn send(&self, message: Message) {
            *self.credit.lock().unwrap() -= 1;
            self.sent.lock().unwrap().push(message);
        }
        fn source_address(&self) -> String {
            self.source.clone()
        }
    }

    #[test]
    fn message_arrival_fans_out_to_waiting_consumer() {
        let broker = Broker::new();
        let conn = CId::next();
        let sender = FakeSender::new(conn, "q0", 1);
        broker.on_sender_opening(sender.clone(), false);

        broker.on_message("q0", Message::text("hello"));

        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(broker.queue_len("q0"), 0);
    }

    #[test]
    fn disconnect_reaps_consumer_registration() {
        let broker = Broker::new();
        let conn = CId::next();
        let sender = FakeSender::new(conn, "q0", 1);
        broker.on_sender_opening(sender.clone(), false);
        assert_eq!(broker.consumer_count("q0"), 1);

        broker.on_connection_gone(conn);
        assert_eq!(broker.consumer_count("q0"), 0);
    }

    #[test]
    fn dynamic_source_gets_synthesised_uuid() {
        let broker = Broker::new();
        let conn = CId::next();
        let sender = FakeSender::new(conn, "", 1);
        let attach = broker.on_sender_opening(sender, true);
        assert!(uuid::Uuid::parse_str(&attach.address).is_ok());
    }

    #[test]
    fn sendable_signal_delivers_backlog_left_by_earlier_forward() {
        let broker = Broker::new();
        let conn = CId::next();
        let sender = FakeSender::new(conn, "q0", 0);
        broker.on_sender_opening(sender.clone(), false);

        broker.on_message("q0", Message::text("a"));
        broker.on_message("q0", Message::text("b"));
        assert_eq!(sender.sent.lock().unwrap().len(), 0);
        assert_eq!(broker.queue_len("q0"), 2);

        *sender.credit.lock().unwrap() = 1;
        broker.on_sendable(sender.as_ref());
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
        assert_eq!(broker.queue_len("q0"), 1);

        *sender.credit.lock().unwrap() = 1;
        broker.on_sendable(sender.as_ref());
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
        assert_eq!(broker.queue_len("q0"), 0);
    }

    #[test]
    fn sender_closing_reaps_single_link_without_touching_connection() {
        let broker = Broker::new();
        let conn = CId::next();
        let a = FakeSender::new(conn, "q0", 1);
        let b = FakeSender::new(conn, "q0", 1);
        broker.on_sender_opening(a.clone(), false);
        broker.on_sender_opening(b.clone(), false);
        assert_eq!(broker.consumer_count("q0"), 2);

        broker.on_sender_closing(a.as_ref());
        assert_eq!(broker.consumer_count("q0"), 1);

        // The connection itself is still live: a second disconnect of the
        // same connection should only reap the remaining link, not panic
        // or double-remove the one already closed individually.
        broker.on_connection_gone(conn);
        assert_eq!(broker.consumer_count("q0"), 0);
    }
}
