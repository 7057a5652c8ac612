use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bytes::BytesMut;
use native_tls::{TlsConnector, TlsStream};

use crate::config::DEFAULT_PORT;
use crate::Error;

/// Size of a single TLS read issued by `Session::wait`.
const READ_CHUNK_LENGTH: usize = 16 << 10;
/// A zero read timeout is rejected by `TcpStream::set_read_timeout`.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Outcome of a bounded wait on a transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Readiness {
    /// Bytes (or EOF) are available to `receive`.
    Readable,
    /// The timeout elapsed with nothing to read.
    Timeout,
    /// The wait was interrupted before either happened. The transport is
    /// still usable for sending.
    Interrupted,
}

/// Byte-level transport underneath a cast connection.
///
/// `receive` follows non-blocking conventions: `Ok(0)` means the peer closed
/// the connection and an `io::ErrorKind::WouldBlock` error means there is
/// nothing to read until the next `wait` reports `Readable`.
pub trait Transport {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Error>;

    fn close(&mut self);

    fn is_connected(&self) -> bool;

    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn wait(&mut self, timeout: Duration) -> io::Result<Readiness>;

    /// Local address of the connected socket, as seen by the device.
    fn local_ip(&self) -> Option<&str>;
}

/// TLS session with a cast device.
#[derive(Debug, Default)]
pub struct Session {
    stream: Option<TlsStream<TcpStream>>,
    local_ip: Option<String>,
    pending: BytesMut,
    eof: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn stream(&mut self) -> io::Result<&mut TlsStream<TcpStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session is closed"))
    }
}

/// Establish a TLS connection. Cast devices present self-signed
/// certificates, so neither the chain nor the hostname is verified.
fn tls_connect(host: &str, port: u16) -> Result<(TlsStream<TcpStream>, String), Error> {
    let connector = TlsConnector::builder()
        .danger_accept_invalid_hostnames(true)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(Error::Tls)?;
    let socket = TcpStream::connect((host, port)).map_err(Error::Connect)?;
    let local_ip = socket.local_addr().map_err(Error::Connect)?.ip().to_string();
    info!("Establishing TLS connection to {}:{}", host, port);
    let stream = connector
        .connect(host, socket)
        .map_err(|err| Error::Handshake(err.to_string()))?;
    Ok((stream, local_ip))
}

impl Transport for Session {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), Error> {
        if self.stream.is_some() {
            warn!("session already connected, closing previous connection");
            self.close();
        }
        let port = if port == 0 { DEFAULT_PORT } else { port };
        match tls_connect(host, port) {
            Ok((stream, local_ip)) => {
                info!("TLS connection established from {}", local_ip);
                self.stream = Some(stream);
                self.local_ip = Some(local_ip);
                self.pending.clear();
                self.eof = false;
                Ok(())
            }
            Err(err) => {
                error!("cannot connect to {}:{}: {}", host, port, err);
                Err(err)
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!("closing TLS session");
            if let Err(err) = stream.shutdown() {
                debug!("error during TLS shutdown: {}", err);
            }
        }
        self.local_ip = None;
        self.pending.clear();
        self.eof = false;
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stream = self.stream()?;
        if let Err(err) = stream.write_all(buf).and_then(|_| stream.flush()) {
            error!("failed to send {} bytes: {}", buf.len(), err);
            return Err(err);
        }
        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            if self.eof {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(self.pending.len());
        let chunk = self.pending.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        Ok(n)
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<Readiness> {
        // Decrypted bytes left over from a previous read are readable now.
        if !self.pending.is_empty() || self.eof {
            return Ok(Readiness::Readable);
        }
        let stream = self.stream()?;
        stream.get_ref().set_read_timeout(Some(timeout.max(MIN_WAIT)))?;
        let mut chunk = [0; READ_CHUNK_LENGTH];
        match stream.read(&mut chunk) {
            Ok(0) => {
                debug!("TLS session closed by peer");
                self.eof = true;
                Ok(Readiness::Readable)
            }
            Ok(n) => {
                trace!("received {} bytes", n);
                self.pending.extend_from_slice(&chunk[..n]);
                Ok(Readiness::Readable)
            }
            Err(ref err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(Readiness::Timeout)
            }
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {
                Ok(Readiness::Interrupted)
            }
            Err(err) => {
                error!("failed to receive: {}", err);
                Err(err)
            }
        }
    }

    fn local_ip(&self) -> Option<&str> {
        self.local_ip.as_ref().map(String::as_str)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;

    #[test]
    fn closed_session_is_not_connected() {
        let mut session = Session::new();
        assert!(!session.is_connected());
        assert_eq!(None, session.local_ip());
        // closing twice is a no-op
        session.close();
        session.close();
        assert!(!session.is_connected());
    }

    #[test]
    fn io_on_closed_session_fails() {
        let mut session = Session::new();
        let err = session.send(b"ping").unwrap_err();
        assert_eq!(io::ErrorKind::NotConnected, err.kind());
        let err = session.wait(Duration::from_millis(10)).unwrap_err();
        assert_eq!(io::ErrorKind::NotConnected, err.kind());
    }

    #[test]
    fn receive_without_pending_bytes_would_block() {
        let mut session = Session::new();
        let mut buf = [0; 4];
        let err = session.receive(&mut buf).unwrap_err();
        assert_eq!(io::ErrorKind::WouldBlock, err.kind());
    }

    #[test]
    fn receive_drains_pending_bytes() {
        let mut session = Session::new();
        session.pending.extend_from_slice(b"abcdef");
        let mut buf = [0; 4];
        assert_eq!(4, session.receive(&mut buf).unwrap());
        assert_eq!(b"abcd", &buf);
        assert_eq!(Readiness::Readable, session.wait(Duration::from_millis(1)).unwrap());
        assert_eq!(2, session.receive(&mut buf).unwrap());
        assert_eq!(b"ef", &buf[..2]);
        session.eof = true;
        assert_eq!(0, session.receive(&mut buf).unwrap());
    }

    #[test]
    fn connect_failure_leaves_session_closed() {
        let mut session = Session::new();
        // Nothing listens on port 1 of the loopback interface.
        assert!(session.connect("127.0.0.1", 1).is_err());
        assert!(!session.is_connected());
        assert_eq!(None, session.local_ip());
    }
}
