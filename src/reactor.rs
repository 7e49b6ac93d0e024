//! The reactor façade: drives connection/session/link acceptance and bridges
//! a real [`fe2o3_amqp`] transport to the [`crate::link`] traits, so
//! `broker.rs` and `client/*.rs` never see a wire type directly.
//!
//! One tokio task per accepted connection, one per session on it, and one
//! per link for delivery pumping, each driving the plain handler functions
//! on [`Broker`].

use crate::broker::Broker;
use crate::link::{ConnectionId, Link, LinkId, ReceiverLink, SenderLink};
use crate::message::{Body, Message};
use fe2o3_amqp::acceptor::{ConnectionAcceptor, LinkAcceptor, LinkEndpoint, SessionAcceptor};
use fe2o3_amqp::{Receiver, Sender};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How often the pump task re-reads the underlying `Sender`'s credit to
/// notice a flow frame that granted more of it without a send happening in
/// between. `fe2o3_amqp::Sender` exposes no event for "credit increased" on
/// its own, so this is the event source for `Broker::on_sendable`.
const CREDIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A consumer (sender) link backed by a real `fe2o3-amqp` `Sender`.
///
/// `send` hands the message to a background task over an unbounded channel
/// rather than blocking the caller, so `Queue::forward`'s synchronous,
/// non-blocking loop can drive it directly. That same task mirrors credit
/// into an atomic after every send and on a short poll tick, and is the
/// thing that notices a credit increase and re-drives `Broker::on_sendable`,
/// and notices a failed send and reports the link as closed to the broker.
pub struct AmqpConsumer {
    id: LinkId,
    connection_id: ConnectionId,
    remote_container: String,
    source: Mutex<String>,
    credit: Arc<AtomicU32>,
    outbox: mpsc::UnboundedSender<Message>,
}

impl std::fmt::Debug for AmqpConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpConsumer")
            .field("id", &self.id)
            .field("source", &self.source.lock().unwrap())
            .finish()
    }
}

impl AmqpConsumer {
    /// Spawns the pump task that owns the real `Sender`, drains `outbox`,
    /// keeps `credit` current, and reports both fresh credit and link
    /// closure back to `broker`.
    fn new(
        id: LinkId,
        connection_id: ConnectionId,
        remote_container: String,
        source: String,
        mut sender: Sender,
        broker: Arc<Broker>,
    ) -> Arc<Self> {
        let credit = Arc::new(AtomicU32::new(sender.credit() as u32));
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let credit_for_task = credit.clone();
            let weak_self = weak.clone();

            tokio::spawn(async move {
                let mut poll = interval(CREDIT_POLL_INTERVAL);
                poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;

                        maybe_message = rx.recv() => {
                            let Some(message) = maybe_message else { break };

                            let body = match message.body {
                                Body::Text(s) => s,
                                Body::Data(d) => String::from_utf8_lossy(&d).into_owned(),
                            };

                            match sender.send(body).await {
                                Ok(_) => {
                                    credit_for_task.fetch_sub(1, Ordering::Relaxed);
                                }
                                Err(err) => {
                                    warn!(%err, "send failed, treating link as detached");
                                    break;
                                }
                            }
                        }

                        _ = poll.tick() => {
                            let observed = sender.credit() as u32;
                            let previous = credit_for_task.swap(observed, Ordering::Relaxed);

                            if observed > previous {
                                if let Some(this) = weak_self.upgrade() {
                                    broker.on_sendable(this.as_ref() as &dyn SenderLink);
                                }
                            }
                        }
                    }
                }

                let _ = sender.close().await;

                if let Some(this) = weak_self.upgrade() {
                    broker.on_sender_closing(this.as_ref());
                }
            });

            Self {
                id,
                connection_id,
                remote_container,
                source: Mutex::new(source),
                credit,
                outbox: tx,
            }
        })
    }

    fn set_source(&self, address: String) {
        *self.source.lock().unwrap() = address;
    }
}

impl Link for AmqpConsumer {
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
        self.remote_container.clone()
    }
}

impl SenderLink for AmqpConsumer {
    fn credit(&self) -> u32 {
        self.credit.load(Ordering::Relaxed)
    }

    fn send(&self, message: Message) {
        let _ = self.outbox.send(message);
    }

    fn source_address(&self) -> String {
        self.source.lock().unwrap().clone()
    }
}

/// A producer (receiver) link backed by a real `fe2o3-amqp` `Receiver`.
pub struct AmqpProducer {
    id: LinkId,
    connection_id: ConnectionId,
    remote_container: String,
    target: String,
}

impl std::fmt::Debug for AmqpProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpProducer")
            .field("id", &self.id)
            .field("target", &self.target)
            .finish()
    }
}

impl Link for AmqpProducer {
    fn id(&self) -> LinkId {
        self.id
    }

    fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    fn is_sender(&self) -> bool {
        false
    }

    fn remote_container(&self) -> String {
        self.remote_container.clone()
    }
}

impl ReceiverLink for AmqpProducer {
    fn target_address(&self) -> &str {
        &self.target
    }
}

/// Binds `domain` and runs the broker accept loop until the process is
/// signalled to stop. Each accepted TCP stream becomes one connection task;
/// each session on it is accepted independently; each link attach is
/// dispatched to the matching `Broker` hook.
pub async fn run_broker(domain: &str, container_id: &str, broker: Arc<Broker>) -> crate::error::Result<()> {
    let listener = TcpListener::bind(domain)
        .await
        .map_err(|e| crate::error::Error::BindFailed(domain.to_string(), e.to_string()))?;

    info!(%domain, "listening");

    let connection_acceptor = ConnectionAcceptor::new(container_id.to_string());

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                error!(%err, "accept failed");
                continue;
            }
        };

        debug!(%peer, "accepted connection");

        let broker = broker.clone();
        let connection_acceptor = connection_acceptor.clone();

        tokio::spawn(async move {
            if let Err(err) = serve_connection(stream, connection_acceptor, broker).await {
                warn!(%peer, %err, "connection task ended with error");
            }
        });
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    connection_acceptor: ConnectionAcceptor,
    broker: Arc<Broker>,
) -> crate::error::Result<()> {
    let connection_id = ConnectionId::next();
    let remote_container;

    let mut connection = connection_acceptor
        .accept(stream)
        .await
        .map_err(|e| crate::error::Error::Protocol(e.to_string()))?;
    remote_container = connection.remote_container_id().unwrap_or_default();

    info!(%remote_container, %connection_id, "connection opened");

    let session_acceptor = SessionAcceptor::new();

    loop {
        let mut session = match session_acceptor.accept(&mut connection).await {
            Ok(session) => session,
            Err(_) => break,
        };

        let broker = broker.clone();
        let remote_container = remote_container.clone();

        tokio::spawn(async move {
            serve_session(&mut session, connection_id, remote_container, broker).await;
            let _ = session.end().await;
        });
    }

    broker.on_connection_gone(connection_id);
    info!(%remote_container, %connection_id, "connection closed");

    Ok(())
}

async fn serve_session(
    session: &mut fe2o3_amqp::Session,
    connection_id: ConnectionId,
    remote_container: String,
    broker: Arc<Broker>,
) {
    let link_acceptor = LinkAcceptor::new();

    loop {
        match link_acceptor.accept(session).await {
            Ok(LinkEndpoint::Sender(sender)) => {
                let dynamic = sender.remote_source_is_dynamic();
                let remote_source = sender.remote_source_address().unwrap_or_default();

                let id = LinkId::next();
                let consumer = AmqpConsumer::new(
                    id,
                    connection_id,
                    remote_container.clone(),
                    remote_source,
                    sender,
                    broker.clone(),
                );

                let attach = broker.on_sender_opening(consumer.clone(), dynamic);
                consumer.set_source(attach.address);
            }
            Ok(LinkEndpoint::Receiver(mut receiver)) => {
                let target = match receiver.remote_target_address() {
                    Some(addr) if !addr.is_empty() => addr,
                    _ => {
                        let _ = receiver.close().await;
                        continue;
                    }
                };

                let id = LinkId::next();
                let producer = Arc::new(AmqpProducer {
                    id,
                    connection_id,
                    remote_container: remote_container.clone(),
                    target: target.clone(),
                });

                broker.on_receiver_opening(producer.as_ref());

                let broker = broker.clone();
                tokio::spawn(async move {
                    pump_producer(&mut receiver, &producer, broker).await;
                });
            }
            Err(_) => break,
        }
    }
}

async fn pump_producer(receiver: &mut Receiver, producer: &AmqpProducer, broker: Arc<Broker>) {
    loop {
        match receiver.recv::<String>().await {
            Ok(delivery) => {
                let _ = receiver.accept(&delivery).await;
                let message = Message::text(delivery.into_body());
                broker.on_message(&producer.target, message);
            }
            Err(_) => break,
        }
    }

    broker.on_receiver_closing(producer);
}
