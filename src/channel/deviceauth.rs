use protobuf::Message;

use crate::channel::{MessageBuilder, DEFAULT_DESTINATION_ID, DEFAULT_SENDER_ID};
use crate::proto::{AuthChallenge, CastMessage, DeviceAuthMessage};
use crate::Error;

pub const NAMESPACE: &str = "urn:x-cast:com.google.cast.tp.deviceauth";

/// Device authentication challenge with an empty challenge body. The device
/// answers with its certificate chain on the same namespace.
pub fn challenge() -> Result<CastMessage, Error> {
    let mut auth = DeviceAuthMessage::new();
    auth.set_challenge(AuthChallenge::new());
    let payload = auth.write_to_bytes()?;
    let message = MessageBuilder::default()
        .namespace(NAMESPACE)
        .source(DEFAULT_SENDER_ID)
        .destination(DEFAULT_DESTINATION_ID)
        .payload_binary(payload)
        .into_message();
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::CastMessage_PayloadType;

    #[test]
    fn challenge_is_binary() {
        let message = challenge().unwrap();
        assert_eq!(NAMESPACE, message.get_namespace());
        assert_eq!("receiver-0", message.get_destination_id());
        assert_eq!(CastMessage_PayloadType::BINARY, message.get_payload_type());
        // field 1, length-delimited, zero length
        assert_eq!(&[0x0a, 0x00], message.get_payload_binary());
        let auth = DeviceAuthMessage::parse_from_bytes(message.get_payload_binary())
            .unwrap();
        assert!(auth.has_challenge());
        assert!(!auth.has_response());
    }
}
