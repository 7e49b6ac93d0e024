//! The message envelope passed between links and queues.

use serde::Serialize;

/// Delivery tag assigned per transmission; opaque beyond equality.
pub type DeliveryTag = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Data(Vec<u8>),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            Body::Data(_) => None,
        }
    }
}

/// The subset of AMQP's `properties` section this crate round-trips for
/// `--json` rendering. The broker never reads these; it only carries them
/// along with the body it stores and forwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageProperties {
    pub content_type: Option<String>,
    pub correlation_id: Option<String>,
    pub user_id: Option<String>,
}

/// An AMQP 1.0 message value, immutable once enqueued at the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub body: Body,
    pub reply_to: Option<String>,
    pub address: Option<String>,
    pub delivery_tag: Option<DeliveryTag>,
    pub properties: MessageProperties,
}

impl Message {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Body::Text(body.into()),
            reply_to: None,
            address: None,
            delivery_tag: None,
            properties: MessageProperties::default(),
        }
    }
}

/// JSON rendering of the full envelope, used by `qreceive --json`.
#[derive(Serialize)]
struct JsonEnvelope<'a> {
    address: &'a Option<String>,
    reply_to: &'a Option<String>,
    properties: &'a MessageProperties,
    body: JsonBody<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum JsonBody<'a> {
    Text(&'a str),
    Data(&'a [u8]),
}

impl Message {
    pub fn to_json(&self) -> serde_json::Result<String> {
        let body = match &self.body {
            Body::Text(s) => JsonBody::Text(s),
            Body::Data(d) => JsonBody::Data(d),
        };

        serde_json::to_string(&JsonEnvelope {
            address: &self.address,
            reply_to: &self.reply_to,
            properties: &self.properties,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_envelope_round_trips_text_body() {
        let mut m = Message::text("hello");
        m.address = Some("q0".to_string());
        let json = m.to_json().unwrap();
        assert!(json.contains("\"hello\""));
        assert!(json.contains("\"q0\""));
    }

    #[test]
    fn json_envelope_carries_properties() {
        let mut m = Message::text("hello");
        m.properties.correlation_id = Some("abc-123".to_string());
        let json = m.to_json().unwrap();
        assert!(json.contains("\"abc-123\""));
    }
}
