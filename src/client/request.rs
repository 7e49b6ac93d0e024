//! `qrequest`: sends a request and waits for its response.
//!
//! Pairs each outgoing sender with its own dynamically-addressed receiver
//! on the same connection; every outgoing request's `reply_to` is set to
//! that receiver's remote-assigned dynamic address once fe2o3-amqp's
//! attach resolves it.

use crate::address::Address;
use crate::client::link::open_connections;
use crate::error::{Error, Result};
use crate::message::Message;
use fe2o3_amqp::{Receiver, Sender};
use fe2o3_amqp_types::messaging::Source;
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

pub struct RequestOptions {
    /// `-r/--request`, enqueued ahead of whatever the feeder reads.
    pub requests: Vec<String>,
    pub input: Input,
    pub verbose: bool,
    pub id: Option<String>,
}

struct ReplySender {
    sender: Sender,
    reply_to: String,
}

/// Sends every request and prints each response as it arrives, in receipt
/// order, exiting once `sent_requests == received_responses` — completion
/// is the response, not the broker's settlement.
pub async fn run(urls: &[Address], options: RequestOptions, mut output: impl std::io::Write) -> Result<()> {
    let mut connections = open_connections(urls, "request", options.id.as_deref()).await?;

    let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<String>();
    let mut senders: VecDeque<ReplySender> = VecDeque::new();

    for conn in &mut connections {
        for address in conn.addresses.clone() {
            let sender = Sender::attach(&mut conn.session, format!("qrequest-{}", address.path), address.path.clone())
                .await
                .map_err(|e| Error::Protocol(e.to_string()))?;

            let mut receiver = Receiver::builder()
                .name(format!("qrequest-reply-{}", address.path))
                .source(Source::builder().dynamic(true).build())
                .attach(&mut conn.session)
                .await
                .map_err(|e| Error::Protocol(e.to_string()))?;

            let reply_to = receiver
                .remote_source_address()
                .unwrap_or_default();

            let resp_tx = resp_tx.clone();
            tokio::spawn(async move {
                loop {
                    match receiver.recv::<String>().await {
                        Ok(delivery) => {
                            let _ = receiver.accept(&delivery).await;
                            if resp_tx.send(delivery.into_body()).is_err() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            });

            senders.push_back(ReplySender { sender, reply_to });
        }
    }
    drop(resp_tx);

    if senders.is_empty() {
        for conn in &mut connections {
            conn.close().await;
        }
        return Ok(());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Option<String>>();

    for body in &options.requests {
        let _ = tx.send(Some(body.clone()));
    }

    spawn_feeder(options.input, tx);

    let mut pending: VecDeque<Message> = VecDeque::new();
    let mut sent_requests: u64 = 0;
    let mut received_responses: u64 = 0;
    let mut stop_requested = false;
    let mut sentinel_seen = false;

    loop {
        if stop_requested && sent_requests == received_responses {
            break;
        }

        // With nothing queued to send, block on whichever arrives first: a
        // response, or the next request from the feeder.
        if pending.is_empty() && !sentinel_seen {
            tokio::select! {
                biased;

                response = resp_rx.recv() => {
                    if let Some(body) = response {
                        record_response(&mut received_responses, body, &mut output, options.verbose)?;
                    }
                    continue;
                }

                next = rx.recv() => {
                    match next {
                        Some(Some(body)) => pending.push_back(Message::text(body)),
                        _ => {
                            sentinel_seen = true;
                            if sent_requests == received_responses {
                                break;
                            }
                            stop_requested = true;
                        }
                    }
                    continue;
                }
            }
        }

        if pending.is_empty() {
            // Sentinel already seen; nothing left to send, only
            // outstanding responses (or settlement) can end the loop.
            match resp_rx.recv().await {
                Some(body) => {
                    record_response(&mut received_responses, body, &mut output, options.verbose)?;
                }
                None => {
                    if stop_requested {
                        break;
                    }
                }
            }
            continue;
        }

        // Drain any responses that arrived while we were busy sending, so
        // output stays close to receipt order instead of batching at EOF.
        while let Ok(body) = resp_rx.try_recv() {
            record_response(&mut received_responses, body, &mut output, options.verbose)?;
        }

        let message = pending.pop_front().expect("checked non-empty above");

        let Some(mut reply_sender) = senders.pop_front() else {
            break;
        };

        if reply_sender.sender.credit() == 0 {
            senders.push_back(reply_sender);
            pending.push_front(message);
            sleep(Duration::from_millis(5)).await;
            continue;
        }

        let body = message.body.as_text().unwrap_or_default().to_string();
        let reply_to = reply_sender.reply_to.clone();

        match reply_sender
            .sender
            .send(fe2o3_amqp::Sendable::builder().reply_to(reply_to).value(body.clone()).build())
            .await
        {
            Ok(_) => {
                sent_requests += 1;
                if options.verbose {
                    info!(%body, sent_requests, "sent request");
                }
            }
            Err(err) => warn!(%err, "request send failed"),
        }

        senders.push_back(reply_sender);
    }

    output.flush()?;

    for reply_sender in senders {
        let _ = reply_sender.sender.close().await;
    }
    for conn in &mut connections {
        conn.close().await;
    }

    Ok(())
}

fn record_response(
    received_responses: &mut u64,
    body: String,
    output: &mut impl std::io::Write,
    verbose: bool,
) -> Result<()> {
    *received_responses += 1;
    writeln!(output, "{body}")?;
    if verbose {
        info!(%body, "received response");
    }
    Ok(())
}

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
