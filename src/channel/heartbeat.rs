use serde_derive::Serialize;

use crate::channel::{MessageBuilder, DEFAULT_DESTINATION_ID, DEFAULT_SENDER_ID};
use crate::proto::CastMessage;
use crate::Error;

pub const NAMESPACE: &str = "urn:x-cast:com.google.cast.tp.heartbeat";

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    Ping,
    Pong,
}

pub fn ping() -> Result<CastMessage, Error> {
    let message = MessageBuilder::default()
        .namespace(NAMESPACE)
        .source(DEFAULT_SENDER_ID)
        .destination(DEFAULT_DESTINATION_ID)
        .payload(&Request::Ping)?
        .into_message();
    Ok(message)
}

pub fn pong() -> Result<CastMessage, Error> {
    let message = MessageBuilder::default()
        .namespace(NAMESPACE)
        .source(DEFAULT_SENDER_ID)
        .destination(DEFAULT_DESTINATION_ID)
        .payload(&Request::Pong)?
        .into_message();
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::json;

    #[test]
    fn ping_pong() {
        let message = ping().unwrap();
        assert_eq!(NAMESPACE, message.get_namespace());
        assert_eq!("receiver-0", message.get_destination_id());
        assert_eq!(serde_json::json!({"type": "PING"}), json(&message));
        assert_eq!(serde_json::json!({"type": "PONG"}), json(&pong().unwrap()));
    }
}
