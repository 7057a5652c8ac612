//! Client side of the cast (CASTV2) control channel.
//!
//! A [`Connection`] owns a TLS session with a cast device, reassembles
//! length-prefixed protobuf frames from it, tracks liveness with heartbeat
//! pings and builds every outbound control message. It is driven by the
//! caller: each call to [`Connection::poll`] waits at most one keepalive
//! window and performs one reassembly step.

#![warn(clippy::all, clippy::pedantic)]

#[macro_use]
extern crate log;

use std::error;
use std::fmt;
use std::io;

pub mod channel;
pub mod codec;
pub mod config;
pub mod keepalive;
#[cfg(test)]
mod mock;
#[allow(clippy::all, clippy::pedantic)]
pub mod proto;
pub mod session;

pub use self::channel::media::Media;
pub use self::codec::Frame;
pub use self::config::Config;
pub use self::session::{Readiness, Session, Transport};

use self::codec::{Decoded, FrameReader};
use self::keepalive::{Keepalive, Timeout};
use self::proto::CastMessage;

#[derive(Debug)]
pub enum Error {
    Connect(io::Error),
    Tls(native_tls::Error),
    Handshake(String),
    Io(io::Error),
    NotConnected,
    ShortWrite { expected: usize, written: usize },
    FrameTooLarge(usize),
    Protobuf(protobuf::ProtobufError),
    Json(serde_json::Error),
    EmptyDestination,
    EmptyMediaSession,
    NonFiniteTime(f64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Connect(err) => write!(f, "connect failed: {}", err),
            Error::Tls(err) => write!(f, "TLS setup failed: {}", err),
            Error::Handshake(err) => write!(f, "TLS handshake failed: {}", err),
            Error::Io(err) => write!(f, "transport error: {}", err),
            Error::NotConnected => write!(f, "not connected"),
            Error::ShortWrite { expected, written } => {
                write!(f, "short write: {} of {} bytes", written, expected)
            }
            Error::FrameTooLarge(len) => write!(f, "frame of {} bytes exceeds max length", len),
            Error::Protobuf(err) => write!(f, "protobuf error: {}", err),
            Error::Json(err) => write!(f, "json error: {}", err),
            Error::EmptyDestination => write!(f, "destination id is empty"),
            Error::EmptyMediaSession => write!(f, "media session id is empty"),
            Error::NonFiniteTime(time) => write!(f, "seek time {} is not finite", time),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<protobuf::ProtobufError> for Error {
    fn from(err: protobuf::ProtobufError) -> Self {
        Error::Protobuf(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

/// Outcome of one [`Connection::poll`] cycle.
#[derive(Debug, PartialEq)]
pub enum Poll {
    /// A full frame arrived.
    Complete(Frame),
    /// Nothing complete yet. Call `poll` again.
    Pending,
    /// The device stopped answering pings. Disconnect and reconnect.
    Dead,
}

/// A control channel session with one cast device.
///
/// Request ids for the receiver and media namespaces are independent
/// counters that start at `0` and live as long as the `Connection`.
#[derive(Debug)]
pub struct Connection<T: Transport = Session> {
    transport: T,
    config: Config,
    reader: FrameReader,
    keepalive: Keepalive,
    receiver_request_id: u64,
    media_request_id: u64,
}

impl Connection<Session> {
    pub fn new(config: Config) -> Self {
        Self::with_transport(Session::new(), config)
    }
}

impl Default for Connection<Session> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<T: Transport> Connection<T> {
    pub fn with_transport(transport: T, config: Config) -> Self {
        let keepalive = Keepalive::new(&config);
        Self {
            transport,
            config,
            reader: FrameReader::new(),
            keepalive,
            receiver_request_id: 0,
            media_request_id: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn keepalive(&self) -> &Keepalive {
        &self.keepalive
    }

    /// Connect to `host:port`, or the default control port if `port` is `0`.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), Error> {
        let port = if port == 0 { self.config.port } else { port };
        self.transport.connect(host, port)?;
        self.reader.reset();
        self.keepalive = Keepalive::new(&self.config);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.transport.close();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn local_ip(&self) -> Option<&str> {
        self.transport.local_ip()
    }

    /// Wait for at most one keepalive window and read what arrived.
    ///
    /// A ping that falls due is sent before returning `Poll::Pending`. An
    /// oversized frame is drained and reported as `Error::FrameTooLarge`; the
    /// connection stays usable.
    pub fn poll(&mut self) -> Result<Poll, Error> {
        if self.keepalive.is_dead() {
            return Ok(Poll::Dead);
        }
        let readiness = self.transport.wait(self.keepalive.timeout()).map_err(|err| {
            error!("wait on transport failed: {}", err);
            Error::Io(err)
        })?;
        match readiness {
            Readiness::Interrupted => Ok(Poll::Pending),
            Readiness::Timeout => match self.keepalive.on_timeout() {
                Timeout::SendPing => {
                    self.ping()?;
                    Ok(Poll::Pending)
                }
                Timeout::Wait => Ok(Poll::Pending),
                Timeout::Dead => Ok(Poll::Dead),
            },
            Readiness::Readable => {
                self.keepalive.on_data();
                match self.reader.read_from(&mut self.transport) {
                    Ok(Decoded::Complete(frame)) => Ok(Poll::Complete(frame)),
                    Ok(Decoded::Pending) => Ok(Poll::Pending),
                    Ok(Decoded::Oversized(len)) => Err(Error::FrameTooLarge(len)),
                    Ok(Decoded::Closed) => {
                        warn!("connection closed by device");
                        Err(Error::Io(io::ErrorKind::UnexpectedEof.into()))
                    }
                    Err(err) => {
                        error!("receive failed: {}", err);
                        Err(Error::Io(err))
                    }
                }
            }
        }
    }

    /// Encode and write one message. The whole frame must be written.
    pub fn send(&mut self, message: &CastMessage) -> Result<(), Error> {
        if !self.transport.is_connected() {
            error!("cannot send on {}: not connected", message.get_namespace());
            return Err(Error::NotConnected);
        }
        let frame = codec::encode(message)?;
        let written = self.transport.send(&frame).map_err(|err| {
            error!("failed to send on {}: {}", message.get_namespace(), err);
            Error::Io(err)
        })?;
        if written != frame.len() {
            error!(
                "short write on {}: {} of {} bytes",
                message.get_namespace(),
                written,
                frame.len()
            );
            return Err(Error::ShortWrite {
                expected: frame.len(),
                written,
            });
        }
        trace!(
            "sent {} byte frame on {} to {}",
            frame.len(),
            message.get_namespace(),
            message.get_destination_id()
        );
        Ok(())
    }

    fn next_receiver_request_id(&mut self) -> u64 {
        let request_id = self.receiver_request_id;
        self.receiver_request_id += 1;
        request_id
    }

    fn next_media_request_id(&mut self) -> u64 {
        let request_id = self.media_request_id;
        self.media_request_id += 1;
        request_id
    }

    /// Open a virtual connection, to the receiver platform when `destination`
    /// is `channel::DEFAULT_DESTINATION_ID` or to a launched application's
    /// transport otherwise.
    pub fn connect_channel(&mut self, destination: &str) -> Result<(), Error> {
        self.send(&channel::connection::connect(destination)?)
    }

    pub fn close_channel(&mut self, destination: &str) -> Result<(), Error> {
        self.send(&channel::connection::close(destination)?)
    }

    pub fn ping(&mut self) -> Result<(), Error> {
        self.send(&channel::heartbeat::ping()?)
    }

    pub fn pong(&mut self) -> Result<(), Error> {
        self.send(&channel::heartbeat::pong()?)
    }

    pub fn auth(&mut self) -> Result<(), Error> {
        let message = channel::deviceauth::challenge()?;
        self.send(&message)
    }

    pub fn receiver_status(&mut self) -> Result<(), Error> {
        let request_id = self.next_receiver_request_id();
        self.send(&channel::receiver::status(request_id)?)
    }

    pub fn launch(&mut self) -> Result<(), Error> {
        let request_id = self.next_receiver_request_id();
        let message = channel::receiver::launch(request_id, &self.config.app_id)?;
        self.send(&message)
    }

    /// Stop the application running as `session_id`.
    pub fn stop_app(&mut self, session_id: &str) -> Result<(), Error> {
        if session_id.is_empty() {
            return Err(Error::EmptyDestination);
        }
        let request_id = self.next_receiver_request_id();
        self.send(&channel::receiver::stop(request_id, session_id)?)
    }

    pub fn media_status(&mut self, destination: &str) -> Result<(), Error> {
        check_destination(destination)?;
        let request_id = self.next_media_request_id();
        self.send(&channel::media::status(request_id, destination)?)
    }

    /// Load the stream served at `http://<local ip>:<media.port>/stream`.
    pub fn load(&mut self, destination: &str, media: &Media) -> Result<(), Error> {
        check_destination(destination)?;
        let local_ip = self.transport.local_ip().ok_or(Error::NotConnected)?.to_owned();
        let request_id = self.next_media_request_id();
        self.send(&channel::media::load(request_id, destination, media, &local_ip)?)
    }

    pub fn play(&mut self, destination: &str, session: &str) -> Result<(), Error> {
        check_media_session(destination, session)?;
        let request_id = self.next_media_request_id();
        self.send(&channel::media::play(request_id, destination, session)?)
    }

    pub fn pause(&mut self, destination: &str, session: &str) -> Result<(), Error> {
        check_media_session(destination, session)?;
        let request_id = self.next_media_request_id();
        self.send(&channel::media::pause(request_id, destination, session)?)
    }

    pub fn stop(&mut self, destination: &str, session: &str) -> Result<(), Error> {
        check_media_session(destination, session)?;
        let request_id = self.next_media_request_id();
        self.send(&channel::media::stop(request_id, destination, session)?)
    }

    /// Seek to `current_time` seconds. NaN and infinite times are rejected.
    pub fn seek(&mut self, destination: &str, session: &str, current_time: f64) -> Result<(), Error> {
        check_media_session(destination, session)?;
        if !current_time.is_finite() {
            return Err(Error::NonFiniteTime(current_time));
        }
        let request_id = self.next_media_request_id();
        let message = channel::media::seek(request_id, destination, session, current_time)?;
        self.send(&message)
    }

    /// Set the stream volume and mute flag. Levels outside `[0.0, 1.0]` are
    /// ignored: no message is sent and `Ok(())` is returned.
    pub fn set_volume(
        &mut self,
        destination: &str,
        session: &str,
        level: f64,
        muted: bool,
    ) -> Result<(), Error> {
        check_media_session(destination, session)?;
        if level < 0.0 || level > 1.0 || level.is_nan() {
            return Ok(());
        }
        let request_id = self.next_media_request_id();
        let message = channel::media::set_volume(request_id, destination, session, level, muted)?;
        self.send(&message)
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn check_destination(destination: &str) -> Result<(), Error> {
    if destination.is_empty() {
        return Err(Error::EmptyDestination);
    }
    Ok(())
}

fn check_media_session(destination: &str, session: &str) -> Result<(), Error> {
    check_destination(destination)?;
    if session.is_empty() {
        return Err(Error::EmptyMediaSession);
    }
    Ok(())
}
