//! Outbound messages, one module per cast namespace.
//!
//! Every builder returns a complete `CastMessage` envelope ready for
//! `codec::encode`. Request ids are owned by the caller.

use serde::Serialize;

use crate::proto::{CastMessage, CastMessage_PayloadType, CastMessage_ProtocolVersion};
use crate::Error;

pub mod connection;
pub mod deviceauth;
pub mod heartbeat;
pub mod media;
pub mod receiver;

/// Destination id of the receiver platform itself.
pub const DEFAULT_DESTINATION_ID: &str = "receiver-0";
pub const DEFAULT_SENDER_ID: &str = "sender-0";

#[derive(Debug)]
enum Payload {
    Utf8(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct MessageBuilder<'a> {
    namespace: Option<&'a str>,
    source: Option<&'a str>,
    destination: Option<&'a str>,
    payload: Option<Payload>,
}

impl<'a> MessageBuilder<'a> {
    pub fn namespace(mut self, namespace: &'a str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn destination(mut self, destination: &'a str) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, Error> {
        let payload = serde_json::to_string(payload).map_err(|err| {
            warn!("cannot serialize payload: {}", err);
            Error::Json(err)
        })?;
        self.payload = Some(Payload::Utf8(payload));
        Ok(self)
    }

    pub fn payload_binary(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(Payload::Binary(payload));
        self
    }

    pub fn into_message(mut self) -> CastMessage {
        let mut message = CastMessage::new();
        message.set_protocol_version(CastMessage_ProtocolVersion::CASTV2_1_0);
        if let Some(source) = self.source.take() {
            message.set_source_id(source.to_owned());
        }
        if let Some(destination) = self.destination.take() {
            message.set_destination_id(destination.to_owned());
        }
        if let Some(namespace) = self.namespace.take() {
            message.set_namespace(namespace.to_owned());
        }
        match self.payload.take() {
            Some(Payload::Utf8(payload)) => {
                message.set_payload_type(CastMessage_PayloadType::STRING);
                message.set_payload_utf8(payload);
            }
            Some(Payload::Binary(payload)) => {
                message.set_payload_type(CastMessage_PayloadType::BINARY);
                message.set_payload_binary(payload);
            }
            None => message.set_payload_type(CastMessage_PayloadType::STRING),
        }
        message
    }
}

#[cfg(test)]
pub(crate) fn json(message: &CastMessage) -> serde_json::Value {
    assert_eq!(CastMessage_PayloadType::STRING, message.get_payload_type());
    assert!(!message.has_payload_binary());
    serde_json::from_str(message.get_payload_utf8()).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_envelope_fields() {
        let message = MessageBuilder::default()
            .namespace("urn:x-cast:test")
            .source(DEFAULT_SENDER_ID)
            .destination("web-5")
            .payload(&serde_json::json!({"type": "TEST"}))
            .unwrap()
            .into_message();
        assert_eq!(CastMessage_ProtocolVersion::CASTV2_1_0, message.get_protocol_version());
        assert_eq!("urn:x-cast:test", message.get_namespace());
        assert_eq!("sender-0", message.get_source_id());
        assert_eq!("web-5", message.get_destination_id());
        assert_eq!("TEST", json(&message)["type"]);
    }

    #[test]
    fn builder_binary_payload() {
        let message = MessageBuilder::default()
            .namespace("urn:x-cast:test")
            .source(DEFAULT_SENDER_ID)
            .destination(DEFAULT_DESTINATION_ID)
            .payload_binary(vec![1, 2, 3])
            .into_message();
        assert_eq!(CastMessage_PayloadType::BINARY, message.get_payload_type());
        assert_eq!(&[1, 2, 3], message.get_payload_binary());
        assert!(!message.has_payload_utf8());
    }

    #[test]
    fn builder_rejects_unserializable_payload() {
        use std::collections::BTreeMap;

        let mut payload = BTreeMap::new();
        payload.insert((1, 2), "tuple keys are not valid json keys");
        let builder = MessageBuilder::default()
            .namespace("urn:x-cast:test")
            .destination(DEFAULT_DESTINATION_ID)
            .payload(&payload);
        match builder {
            Err(Error::Json(_)) => (),
            builder => panic!("unexpected {:?}", builder),
        }
    }
}
