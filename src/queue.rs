//! The per-address FIFO + consumer set backing a single queue.

use crate::link::SenderLink;
use crate::message::Message;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Ordered sequence of pending messages plus an ordered list of consumers.
///
/// Invariants: no duplicate consumer; `store_message` only appends;
/// `forward` is the only place a message is dequeued.
pub struct Queue {
    address: String,
    messages: VecDeque<Message>,
    consumers: Vec<Arc<dyn SenderLink>>,
}

impl Queue {
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        debug!(%address, "creating queue");

        Self {
            address,
            messages: VecDeque::new(),
            consumers: Vec::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Adds `link` as a consumer. Panics if `link` is already present — a
    /// programmer error, not a recoverable protocol condition.
    pub fn add_consumer(&mut self, link: Arc<dyn SenderLink>) {
        assert!(
            !self.consumers.iter().any(|c| c.id() == link.id()),
            "link {} is already a consumer of {}",
            link.id(),
            self.address
        );

        debug!(consumer = %link.remote_container(), queue = %self.address, "adding consumer");
        self.consumers.push(link);
    }

    /// Removes `link` from the consumer set. A no-op if absent.
    pub fn remove_consumer(&mut self, link_id: crate::link::LinkId) {
        if let Some(pos) = self.consumers.iter().position(|c| c.id() == link_id) {
            let removed = self.consumers.remove(pos);
            debug!(consumer = %removed.remote_container(), queue = %self.address, "removing consumer");
        }
    }

    pub fn consumers(&self) -> &[Arc<dyn SenderLink>] {
        &self.consumers
    }

    /// Appends `message` to the tail of the FIFO. This is the only place a
    /// message enters the queue.
    pub fn store_message(&mut self, message: Message) {
        self.messages.push_back(message);
    }

    /// While `link.credit() > 0` and the queue is non-empty, pops the head
    /// message and hands it to `link.send`. Stops when either side is
    /// exhausted. This is the only place dequeue happens.
    ///
    /// Safe to call redundantly: extra calls simply find no messages or no
    /// credit and return immediately.
    pub fn forward(&mut self, link: &dyn SenderLink) {
        debug!(
            queue = %self.address,
            depth = self.messages.len(),
            consumers = self.consumers.len(),
            "forward"
        );

        while link.credit() > 0 {
            let Some(message) = self.messages.pop_front() else {
                break;
            };

            link.send(message);
        }
    }

    /// Runs `forward` against every consumer, in subscription order. Net
    /// effect is competing-consumer delivery: each stored message goes to
    /// exactly one consumer, whichever has credit first in iteration order.
    pub fn forward_to_all(&mut self) {
        let consumers: Vec<Arc<dyn SenderLink>> = self.consumers.clone();

        for consumer in &consumers {
            self.forward(consumer.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ConnectionId, Link, LinkId};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FakeSender {
        id: LinkId,
        connection_id: ConnectionId,
        credit: Mutex<u32>,
        sent: Mutex<Vec<Message>>,
        source: String,
    }

    impl FakeSender {
        fn new(credit: u32) -> Arc<Self> {
            Arc::new(Self {
                id: LinkId::next(),
                connection_id: ConnectionId::next(),
                credit: Mutex::new(credit),
                sent: Mutex::new(Vec::new()),
                source: "q0".to_string(),
            })
        }

        fn grant(&self, n: u32) {
            *self.credit.lock().unwrap() += n;
        }

        fn received(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Link for FakeSender {
        fn id(&self) -> LinkId {
            self.id
        }

        fn connection_id(&self) -> ConnectionId {
            self.connection_id
        }

        fn is_sender(&self) -> bool {
            true
        }

        fn remote_container(&self) -> String {
            "test-peer".to_string()
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
    fn forward_drains_up_to_credit() {
        let mut q = Queue::new("q0");
        q.store_message(Message::text("a"));
        q.store_message(Message::text("b"));
        q.store_message(Message::text("c"));

        let sender = FakeSender::new(0);
        q.add_consumer(sender.clone());

        q.forward(sender.as_ref());
        assert_eq!(sender.received().len(), 0);
        assert_eq!(q.len(), 3);

        sender.grant(1);
        q.forward(sender.as_ref());
        assert_eq!(sender.received().len(), 1);
        assert_eq!(q.len(), 2);

        sender.grant(2);
        q.forward(sender.as_ref());
        assert_eq!(sender.received().len(), 3);
        assert_eq!(q.len(), 0);

        let bodies: Vec<_> = sender
            .received()
            .iter()
            .map(|m| m.body.as_text().unwrap().to_string())
            .collect();
        assert_eq!(bodies, vec!["a", "b", "c"]);
    }

    #[test]
    #[should_panic]
    fn add_consumer_twice_panics() {
        let mut q = Queue::new("q0");
        let sender = FakeSender::new(1);
        q.add_consumer(sender.clone());
        q.add_consumer(sender);
    }

    #[test]
    fn remove_absent_consumer_is_noop() {
        let mut q = Queue::new("q0");
        q.remove_consumer(LinkId::next());
        assert_eq!(q.consumer_count(), 0);
    }

    #[test]
    fn competing_consumers_each_message_delivered_once() {
        let mut q = Queue::new("q0");
        let a = FakeSender::new(3);
        let b = FakeSender::new(3);
        q.add_consumer(a.clone());
        q.add_consumer(b.clone());

        for body in ["m0", "m1", "m2", "m3", "m4", "m5"] {
            q.store_message(Message::text(body));
            q.forward_to_all();
        }

        assert_eq!(a.received().len() + b.received().len(), 6);
        assert_eq!(q.len(), 0);
    }
}
