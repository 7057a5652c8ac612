use std::net::IpAddr;

use serde::Serializer;
use serde_derive::Serialize;
use url::Url;

use crate::channel::{MessageBuilder, DEFAULT_SENDER_ID};
use crate::proto::CastMessage;
use crate::Error;

pub const NAMESPACE: &str = "urn:x-cast:com.google.cast.media";
const METADATA_TYPE_GENERIC: u32 = 0;

/// Media session ids are integers on the wire. Ids that do not parse as one
/// are forwarded as strings.
#[derive(Debug, Clone, Copy)]
pub struct MediaSessionId<'a>(pub &'a str);

impl<'a> serde::Serialize for MediaSessionId<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(id) => serializer.serialize_i64(id),
            Err(_) => serializer.serialize_str(self.0),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request<'a> {
    #[serde(rename_all = "camelCase")]
    GetStatus { request_id: u64 },
    #[serde(rename_all = "camelCase")]
    Load {
        request_id: u64,
        media: MediaInformation,
        autoplay: bool,
    },
    #[serde(rename_all = "camelCase")]
    Play {
        request_id: u64,
        media_session_id: MediaSessionId<'a>,
    },
    #[serde(rename_all = "camelCase")]
    Pause {
        request_id: u64,
        media_session_id: MediaSessionId<'a>,
    },
    #[serde(rename_all = "camelCase")]
    Stop {
        request_id: u64,
        media_session_id: MediaSessionId<'a>,
    },
    #[serde(rename_all = "camelCase")]
    Seek {
        request_id: u64,
        media_session_id: MediaSessionId<'a>,
        current_time: f64,
    },
    #[serde(rename_all = "camelCase")]
    SetVolume {
        request_id: u64,
        media_session_id: MediaSessionId<'a>,
        volume: Volume,
    },
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::module_name_repetitions)]
pub struct MediaInformation {
    pub content_id: String,
    pub stream_type: StreamType,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[derive(Serialize, Debug, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    None,
    Buffered,
    Live,
}

#[derive(Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub metadata_type: u32,
    pub title: String,
    pub images: Vec<Image>,
}

#[derive(Serialize, Debug)]
pub struct Image {
    pub url: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Volume {
    pub level: f64,
    pub muted: bool,
}

/// Media served by the sender's HTTP endpoint at `/stream`.
#[derive(Clone, Debug, Default)]
pub struct Media {
    pub title: String,
    /// Forwarded verbatim to the device, but only if it is an http(s) URL.
    pub artwork: Option<String>,
    pub content_type: String,
    /// Port of the HTTP endpoint on the local address.
    pub port: u16,
}

impl Media {
    /// URL of the stream as reachable from the device.
    pub fn content_url(&self, local_ip: &str) -> String {
        match local_ip.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("http://[{}]:{}/stream", ip, self.port),
            _ => format!("http://{}:{}/stream", local_ip, self.port),
        }
    }

    fn images(&self) -> Vec<Image> {
        let artwork = match self.artwork {
            Some(ref artwork) => artwork,
            None => return vec![],
        };
        match Url::parse(artwork) {
            Ok(ref url) if url.scheme() == "http" || url.scheme() == "https" => vec![Image {
                url: artwork.to_owned(),
            }],
            _ => {
                debug!("dropping artwork with non-http url {}", artwork);
                vec![]
            }
        }
    }
}

pub fn status(request_id: u64, destination: &str) -> Result<CastMessage, Error> {
    message(destination, &Request::GetStatus { request_id })
}

pub fn load(
    request_id: u64,
    destination: &str,
    media: &Media,
    local_ip: &str,
) -> Result<CastMessage, Error> {
    let metadata = if media.title.is_empty() {
        None
    } else {
        Some(Metadata {
            metadata_type: METADATA_TYPE_GENERIC,
            title: media.title.to_owned(),
            images: media.images(),
        })
    };
    let media = MediaInformation {
        content_id: media.content_url(local_ip),
        stream_type: StreamType::Live,
        content_type: media.content_type.to_owned(),
        metadata,
    };
    let payload = Request::Load {
        request_id,
        media,
        autoplay: false,
    };
    message(destination, &payload)
}

pub fn play(request_id: u64, destination: &str, session: &str) -> Result<CastMessage, Error> {
    let payload = Request::Play {
        request_id,
        media_session_id: MediaSessionId(session),
    };
    message(destination, &payload)
}

pub fn pause(request_id: u64, destination: &str, session: &str) -> Result<CastMessage, Error> {
    let payload = Request::Pause {
        request_id,
        media_session_id: MediaSessionId(session),
    };
    message(destination, &payload)
}

pub fn stop(request_id: u64, destination: &str, session: &str) -> Result<CastMessage, Error> {
    let payload = Request::Stop {
        request_id,
        media_session_id: MediaSessionId(session),
    };
    message(destination, &payload)
}

/// `current_time` is in seconds and must be finite. JSON has no NaN or
/// infinity.
pub fn seek(
    request_id: u64,
    destination: &str,
    session: &str,
    current_time: f64,
) -> Result<CastMessage, Error> {
    if !current_time.is_finite() {
        return Err(Error::NonFiniteTime(current_time));
    }
    let payload = Request::Seek {
        request_id,
        media_session_id: MediaSessionId(session),
        current_time,
    };
    message(destination, &payload)
}

/// `level` must already be within `[0.0, 1.0]`.
pub fn set_volume(
    request_id: u64,
    destination: &str,
    session: &str,
    level: f64,
    muted: bool,
) -> Result<CastMessage, Error> {
    let payload = Request::SetVolume {
        request_id,
        media_session_id: MediaSessionId(session),
        volume: Volume { level, muted },
    };
    message(destination, &payload)
}

fn message(destination: &str, payload: &Request) -> Result<CastMessage, Error> {
    let message = MessageBuilder::default()
        .namespace(NAMESPACE)
        .source(DEFAULT_SENDER_ID)
        .destination(destination)
        .payload(payload)?
        .into_message();
    Ok(message)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::channel;

    fn media(artwork: Option<&str>) -> Media {
        Media {
            title: "X".to_owned(),
            artwork: artwork.map(str::to_owned),
            content_type: "video/mp4".to_owned(),
            port: 8080,
        }
    }

    #[test]
    fn load_message() {
        let message = load(4, "web-1", &media(Some("http://img/a.png")), "10.0.0.5").unwrap();
        assert_eq!(NAMESPACE, message.get_namespace());
        assert_eq!("web-1", message.get_destination_id());
        assert_eq!(
            json!({
                "type": "LOAD",
                "requestId": 4,
                "autoplay": false,
                "media": {
                    "contentId": "http://10.0.0.5:8080/stream",
                    "streamType": "LIVE",
                    "contentType": "video/mp4",
                    "metadata": {
                        "metadataType": 0,
                        "title": "X",
                        "images": [{"url": "http://img/a.png"}],
                    },
                },
            }),
            channel::json(&message)
        );
    }

    #[test]
    fn load_drops_non_http_artwork() {
        for artwork in &[Some("file:///tmp/a.png"), Some("not a url"), None] {
            let message = load(0, "web-1", &media(*artwork), "10.0.0.5").unwrap();
            let payload = channel::json(&message);
            assert_eq!(json!([]), payload["media"]["metadata"]["images"]);
        }
        let message = load(0, "web-1", &media(Some("https://img/b.jpg")), "10.0.0.5").unwrap();
        let payload = channel::json(&message);
        assert_eq!(
            json!([{"url": "https://img/b.jpg"}]),
            payload["media"]["metadata"]["images"]
        );
    }

    #[test]
    fn content_url_brackets_ipv6() {
        assert_eq!(
            "http://[fe80::1]:8080/stream",
            media(None).content_url("fe80::1")
        );
        assert_eq!(
            "http://192.168.1.2:8080/stream",
            media(None).content_url("192.168.1.2")
        );
    }

    #[test]
    fn transport_controls() {
        assert_eq!(
            json!({"type": "PLAY", "requestId": 1, "mediaSessionId": 42}),
            channel::json(&play(1, "web-1", "42").unwrap())
        );
        assert_eq!(
            json!({"type": "PAUSE", "requestId": 2, "mediaSessionId": 42}),
            channel::json(&pause(2, "web-1", "42").unwrap())
        );
        assert_eq!(
            json!({"type": "STOP", "requestId": 3, "mediaSessionId": 42}),
            channel::json(&stop(3, "web-1", "42").unwrap())
        );
        assert_eq!(
            json!({"type": "SEEK", "requestId": 4, "mediaSessionId": 42, "currentTime": 12.5}),
            channel::json(&seek(4, "web-1", "42", 12.5).unwrap())
        );
        assert_eq!(
            json!({"type": "GET_STATUS", "requestId": 5}),
            channel::json(&status(5, "web-1").unwrap())
        );
    }

    #[test]
    fn non_numeric_session_id_is_a_string() {
        assert_eq!(
            json!("abc"),
            channel::json(&play(1, "web-1", "abc").unwrap())["mediaSessionId"]
        );
    }

    #[test]
    fn volume_mute_flag_is_forwarded() {
        assert_eq!(
            json!({"level": 0.5, "muted": true}),
            channel::json(&set_volume(0, "web-1", "42", 0.5, true).unwrap())["volume"]
        );
        assert_eq!(
            json!({"level": 0.0, "muted": false}),
            channel::json(&set_volume(0, "web-1", "42", 0.0, false).unwrap())["volume"]
        );
    }

    #[test]
    fn artwork_url_is_forwarded_verbatim() {
        let artwork = "http://Img.Example:80/a%20b.png?x=1";
        let message = load(0, "web-1", &media(Some(artwork)), "10.0.0.5").unwrap();
        assert_eq!(
            json!([{"url": artwork}]),
            channel::json(&message)["media"]["metadata"]["images"]
        );
    }

    #[test]
    fn untitled_media_has_no_metadata() {
        let untitled = Media {
            title: String::new(),
            ..media(Some("http://img/a.png"))
        };
        let message = load(0, "web-1", &untitled, "10.0.0.5").unwrap();
        let payload = channel::json(&message);
        assert!(payload["media"].get("metadata").is_none());
        assert_eq!("http://10.0.0.5:8080/stream", payload["media"]["contentId"]);
    }

    #[test]
    fn seek_rejects_non_finite_time() {
        for time in &[std::f64::NAN, std::f64::INFINITY, std::f64::NEG_INFINITY] {
            match seek(0, "web-1", "42", *time) {
                Err(Error::NonFiniteTime(_)) => (),
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
