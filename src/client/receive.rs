//! `qreceive`: attaches one receiver per address and prints each delivery
//! as it arrives.

use crate::address::Address;
use crate::client::link::open_connections;
use crate::error::{Error, Result};
use crate::message::Message;
use fe2o3_amqp::Receiver;
use futures::stream::{select_all, StreamExt};
use std::io::Write;

pub struct ReceiveOptions {
    /// Stop after this many deliveries; `None` means unbounded.
    pub count: Option<u64>,
    pub json: bool,
    pub no_prefix: bool,
    pub verbose: bool,
    pub id: Option<String>,
}

/// Reads deliveries from every address in `urls` and writes one line per
/// message to `output`. Stops after `options.count` deliveries (if set) and
/// closes every connection.
pub async fn run(urls: &[Address], options: ReceiveOptions, mut output: impl Write) -> Result<()> {
    let mut connections = open_connections(urls, "receive", options.id.as_deref()).await?;

    let mut streams = Vec::new();
    for conn in &mut connections {
        for address in conn.addresses.clone() {
            let receiver = Receiver::attach(&mut conn.session, format!("qreceive-{}", address.path), address.path.clone())
                .await
                .map_err(|e| Error::Protocol(e.to_string()))?;

            streams.push(receiver_stream(address.path.clone(), receiver));
        }
    }

    let mut merged = select_all(streams);
    let mut received: u64 = 0;

    while let Some((path, message)) = merged.next().await {
        if let Some(max) = options.count {
            if received >= max {
                break;
            }
        }

        received += 1;
        write_delivery(&mut output, &path, &message, &options)?;

        if options.verbose {
            tracing::info!(address = %path, "received message");
        }

        if options.count == Some(received) {
            break;
        }
    }

    output.flush()?;

    for conn in &mut connections {
        conn.close().await;
    }

    Ok(())
}

fn write_delivery(output: &mut impl Write, path: &str, message: &Message, options: &ReceiveOptions) -> Result<()> {
    if options.json {
        let json = message.to_json()?;
        writeln!(output, "{json}")?;
        return Ok(());
    }

    let body = message.body.as_text().unwrap_or_default();

    if options.no_prefix {
        writeln!(output, "{body}")?;
    } else {
        writeln!(output, "{path}: {body}")?;
    }

    Ok(())
}

/// Wraps a `Receiver` as a `Stream` of `(source address, Message)`, settling
/// each delivery as it is read.
fn receiver_stream(path: String, receiver: Receiver) -> impl futures::Stream<Item = (String, Message)> {
    futures::stream::unfold((path, receiver), |(path, mut receiver)| async move {
        loop {
            match receiver.recv::<String>().await {
                Ok(delivery) => {
                    let _ = receiver.accept(&delivery).await;
                    let message = Message::text(delivery.into_body());
                    return Some(((path.clone(), message), (path, receiver)));
                }
                Err(_) => return None,
            }
        }
    })
}
