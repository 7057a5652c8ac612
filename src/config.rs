use std::time::Duration;

/// Well-known TLS port of the cast control channel.
pub const DEFAULT_PORT: u16 = 8009;
/// Application launched on the receiver, the Default Media Receiver.
pub const DEFAULT_APP_ID: &str = "CC1AD845";

/// The receiver pings its senders about every 5 seconds.
const PING_INTERVAL: Duration = Duration::from_millis(6000);
const PONG_TIMEOUT: Duration = Duration::from_millis(2000);
const PING_RETRIES: u32 = 2;

/// Tunables for a [`Connection`](../struct.Connection.html).
#[derive(Clone, Debug)]
pub struct Config {
    /// Port used when `connect` is called with port `0`.
    pub port: u16,
    /// Application id sent with `LAUNCH`.
    pub app_id: String,
    /// Length of a wait cycle while the connection is healthy.
    pub ping_interval: Duration,
    /// Length of a wait cycle after a ping has been sent.
    pub pong_timeout: Duration,
    /// Number of pong windows that may elapse before the connection is
    /// declared dead.
    pub ping_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            app_id: DEFAULT_APP_ID.to_owned(),
            ping_interval: PING_INTERVAL,
            pong_timeout: PONG_TIMEOUT,
            ping_retries: PING_RETRIES,
        }
    }
}
