use serde_derive::Serialize;

use crate::channel::{MessageBuilder, DEFAULT_SENDER_ID};
use crate::proto::CastMessage;
use crate::Error;

pub const NAMESPACE: &str = "urn:x-cast:com.google.cast.tp.connection";
const USER_AGENT: &str = "cast-control";

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    Connect { user_agent: String },
    Close,
}

/// Open a virtual connection to `destination`.
pub fn connect(destination: &str) -> Result<CastMessage, Error> {
    let payload = Request::Connect {
        user_agent: USER_AGENT.to_owned(),
    };
    let message = MessageBuilder::default()
        .namespace(NAMESPACE)
        .source(DEFAULT_SENDER_ID)
        .destination(destination)
        .payload(&payload)?
        .into_message();
    Ok(message)
}

pub fn close(destination: &str) -> Result<CastMessage, Error> {
    let message = MessageBuilder::default()
        .namespace(NAMESPACE)
        .source(DEFAULT_SENDER_ID)
        .destination(destination)
        .payload(&Request::Close)?
        .into_message();
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{json, DEFAULT_DESTINATION_ID};

    #[test]
    fn connect_message() {
        let message = connect(DEFAULT_DESTINATION_ID).unwrap();
        assert_eq!(NAMESPACE, message.get_namespace());
        assert_eq!("receiver-0", message.get_destination_id());
        let payload = json(&message);
        assert_eq!("CONNECT", payload["type"]);
        assert_eq!(USER_AGENT, payload["userAgent"]);
        assert!(payload.get("requestId").is_none());
    }

    #[test]
    fn close_message() {
        let message = close("web-7").unwrap();
        assert_eq!("web-7", message.get_destination_id());
        assert_eq!(serde_json::json!({"type": "CLOSE"}), json(&message));
    }
}
