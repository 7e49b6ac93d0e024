//! Connection setup shared by the three client tools: group addresses by
//! `host:port`, dial out once per group with anonymous SASL, and begin one
//! session per connection.

use crate::address::Address;
use crate::config::default_container_id;
use crate::error::{Error, Result};
use fe2o3_amqp::sasl_profile::SaslProfile;
use fe2o3_amqp::{Connection, Session};
use std::collections::HashMap;
use tracing::info;

/// One dialled-out AMQP connection, grouped by `host:port`, with its single
/// session (clients in this crate never need more than one session per
/// connection).
pub struct OpenConnection {
    pub domain: String,
    pub connection: Connection,
    pub session: Session,
    pub addresses: Vec<Address>,
}

impl OpenConnection {
    pub async fn close(&mut self) {
        let _ = self.session.end().await;
        let _ = self.connection.close().await;
    }
}

/// Groups `urls` by `host:port` and opens one connection (with anonymous
/// SASL) and one session per group.
pub async fn open_connections(urls: &[Address], role: &str, id_override: Option<&str>) -> Result<Vec<OpenConnection>> {
    let container_id = id_override
        .map(str::to_string)
        .unwrap_or_else(|| default_container_id(role));

    let mut groups: HashMap<String, Vec<Address>> = HashMap::new();
    for url in urls {
        groups.entry(url.domain()).or_default().push(url.clone());
    }

    let mut opened = Vec::with_capacity(groups.len());

    for (domain, addresses) in groups {
        let mut connection = Connection::builder()
            .container_id(container_id.clone())
            .sasl_profile(SaslProfile::Anonymous)
            .open(format!("amqp://{domain}"))
            .await
            .map_err(|e| Error::ConnectionLost(format!("{domain}: {e}")))?;

        info!(%domain, "connected");

        let session = Session::begin(&mut connection)
            .await
            .map_err(|e| Error::Protocol(e.to_string()))?;

        opened.push(OpenConnection {
            domain,
            connection,
            session,
            addresses,
        });
    }

    Ok(opened)
}
