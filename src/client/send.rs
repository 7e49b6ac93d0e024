//! `qsend`: reads message bodies from literal `-m` flags and/or an input
//! stream, and round-robins them across one or more attached senders.
//!
//! The feeder is a plain background thread; it hands lines to the
//! dispatcher loop over an unbounded `tokio::sync::mpsc` channel. Since
//! `fe2o3_amqp::Sender::attach` only resolves once the link is actually
//! attached, the dispatcher never needs a separate readiness latch — by
//! the time the attach loop below returns, every sender already has
//! whatever credit the peer chose to grant.

use crate::address::Address;
use crate::client::link::open_connections;
use crate::error::{Error, Result};
use crate::message::Message;
use fe2o3_amqp::Sender;
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

pub enum Input {
    Stdin,
    File(PathBuf),
}

pub struct SendOptions {
    /// `-m/--message`, enqueued ahead of whatever the feeder reads.
    pub messages: Vec<String>,
    pub input: Input,
    pub verbose: bool,
    pub id: Option<String>,
}

/// Sends every literal `-m` message, then every line read from `input`, to
/// the targets in `urls`, round-robining across multiple targets, and
/// exits once every sent message has settled.
pub async fn run(urls: &[Address], options: SendOptions) -> Result<()> {
    let mut connections = open_connections(urls, "send", options.id.as_deref()).await?;

    let mut senders: VecDeque<Sender> = VecDeque::new();
    for conn in &mut connections {
        for address in conn.addresses.clone() {
            let sender = Sender::attach(&mut conn.session, format!("qsend-{}", address.path), address.path.clone())
                .await
                .map_err(|e| Error::Protocol(e.to_string()))?;

            info!(target = %address.path, "sender attached");
            senders.push_back(sender);
        }
    }

    if senders.is_empty() {
        for conn in &mut connections {
            conn.close().await;
        }

        return Ok(());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Option<String>>();

    for body in &options.messages {
        let _ = tx.send(Some(body.clone()));
    }

    spawn_feeder(options.input, tx);

    let mut pending: VecDeque<Message> = VecDeque::new();
    let mut sent: u64 = 0;
    let mut settled: u64 = 0;
    let mut stop_requested = false;
    let mut sentinel_seen = false;

    loop {
        if stop_requested && sent == settled {
            break;
        }

        let message = match pending.pop_front() {
            Some(message) => message,
            None if sentinel_seen => {
                if sent == settled {
                    break;
                }
                sleep(Duration::from_millis(5)).await;
                continue;
            }
            None => match rx.recv().await {
                Some(Some(body)) => Message::text(body),
                _ => {
                    sentinel_seen = true;
                    if sent == settled {
                        break;
                    }
                    stop_requested = true;
                    continue;
                }
            },
        };

        let Some(mut sender) = senders.pop_front() else {
            break;
        };

        if sender.credit() == 0 {
            senders.push_back(sender);
            pending.push_front(message);
            sleep(Duration::from_millis(5)).await;
            continue;
        }

        let body = message.body.as_text().unwrap_or_default().to_string();

        match sender.send(body.clone()).await {
            Ok(_) => {
                sent += 1;
                // Sent over a presettled link: settlement coincides with
                // the transfer itself, so the counters move together.
                settled += 1;

                if options.verbose {
                    info!(%body, sent, "sent message");
                }
            }
            Err(err) => warn!(%err, "send failed"),
        }

        senders.push_back(sender);
    }

    for mut sender in senders {
        let _ = sender.close().await;
    }

    for conn in &mut connections {
        conn.close().await;
    }

    Ok(())
}

/// Reads `input` one line per message; a non-empty line becomes a message,
/// EOF enqueues the sentinel `None`. Runs as a detached background thread
/// for the life of the process.
fn spawn_feeder(input: Input, tx: mpsc::UnboundedSender<Option<String>>) {
    std::thread::spawn(move || {
        let reader: Box<dyn BufRead> = match input {
            Input::Stdin => Box::new(std::io::BufReader::new(std::io::stdin())),
            Input::File(path) => match std::fs::File::open(&path) {
                Ok(file) => Box::new(std::io::BufReader::new(file)),
                Err(err) => {
                    warn!(%err, path = %path.display(), "failed to open input file");
                    let _ = tx.send(None);
                    return;
                }
            },
        };

        for line in reader.lines() {
            match line {
                Ok(body) if !body.is_empty() => {
                    if tx.send(Some(body)).is_err() {
                        break;
                    }
                }
                Ok(_) => continue,
                Err(_) => break,
            }
        }

        let _ = tx.send(None);
    });
}
