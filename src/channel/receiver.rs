use serde_derive::Serialize;

use crate::channel::{MessageBuilder, DEFAULT_DESTINATION_ID, DEFAULT_SENDER_ID};
use crate::proto::CastMessage;
use crate::Error;

pub const NAMESPACE: &str = "urn:x-cast:com.google.cast.receiver";

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request<'a> {
    #[serde(rename_all = "camelCase")]
    Launch { request_id: u64, app_id: &'a str },
    #[serde(rename_all = "camelCase")]
    GetStatus { request_id: u64 },
    #[serde(rename_all = "camelCase")]
    Stop { request_id: u64, session_id: &'a str },
}

pub fn launch(request_id: u64, app_id: &str) -> Result<CastMessage, Error> {
    let payload = Request::Launch { request_id, app_id };
    message(&payload)
}

pub fn status(request_id: u64) -> Result<CastMessage, Error> {
    message(&Request::GetStatus { request_id })
}

/// Stop the application running as `session_id`.
pub fn stop(request_id: u64, session_id: &str) -> Result<CastMessage, Error> {
    let payload = Request::Stop {
        request_id,
        session_id,
    };
    message(&payload)
}

fn message(payload: &Request) -> Result<CastMessage, Error> {
    let message = MessageBuilder::default()
        .namespace(NAMESPACE)
        .source(DEFAULT_SENDER_ID)
        .destination(DEFAULT_DESTINATION_ID)
        .payload(payload)?
        .into_message();
    Ok(message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::channel;

    #[test]
    fn launch_message() {
        let message = launch(3, "CC1AD845").unwrap();
        assert_eq!(NAMESPACE, message.get_namespace());
        assert_eq!("receiver-0", message.get_destination_id());
        assert_eq!(
            json!({"type": "LAUNCH", "requestId": 3, "appId": "CC1AD845"}),
            channel::json(&message)
        );
    }

    #[test]
    fn status_message() {
        assert_eq!(
            json!({"type": "GET_STATUS", "requestId": 0}),
            channel::json(&status(0).unwrap())
        );
    }

    #[test]
    fn stop_message() {
        assert_eq!(
            json!({"type": "STOP", "requestId": 9, "sessionId": "abc-123"}),
            channel::json(&stop(9, "abc-123").unwrap())
        );
    }
}
