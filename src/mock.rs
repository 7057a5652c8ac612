use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::session::{Readiness, Transport};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
enum End {
    Open,
    Closed,
    Fail(io::ErrorKind),
}

/// Scripted transport. Each chunk is delivered as one readiness event: once a
/// chunk is consumed the next `receive` would block until the next `wait`.
#[derive(Debug)]
pub struct MockTransport {
    chunks: VecDeque<Vec<u8>>,
    boundary: bool,
    end: End,
    interrupts: usize,
    connected: bool,
    local_ip: Option<String>,
    pub sent: Vec<Vec<u8>>,
    pub timeouts: Vec<Duration>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            chunks: VecDeque::new(),
            boundary: false,
            end: End::Open,
            interrupts: 0,
            connected: false,
            local_ip: None,
            sent: vec![],
            timeouts: vec![],
        }
    }
}

impl MockTransport {
    pub fn with_chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn connected(local_ip: &str) -> Self {
        Self {
            connected: true,
            local_ip: Some(local_ip.to_owned()),
            ..Self::default()
        }
    }

    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        self.chunks.push_back(chunk);
    }

    pub fn interrupt_next_wait(&mut self) {
        self.interrupts += 1;
    }

    pub fn close_after_chunks(&mut self) {
        self.end = End::Closed;
    }

    pub fn fail_after_chunks(&mut self, kind: io::ErrorKind) {
        self.end = End::Fail(kind);
    }

    pub fn chunks_remaining(&self) -> usize {
        self.chunks.len()
    }

    /// No further reads can make progress.
    pub fn is_exhausted(&self) -> bool {
        self.chunks.is_empty() && !self.boundary && self.end == End::Open
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _host: &str, _port: u16) -> Result<(), Error> {
        self.connected = true;
        if self.local_ip.is_none() {
            self.local_ip = Some("127.0.0.1".to_owned());
        }
        Ok(())
    }

    fn close(&mut self) {
        self.connected = false;
        self.local_ip = None;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        self.sent.push(buf.to_vec());
        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.boundary {
            self.boundary = false;
            return Err(io::ErrorKind::WouldBlock.into());
        }
        if let Some(chunk) = self.chunks.front_mut() {
            let n = buf.len().min(chunk.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            chunk.drain(..n);
            if chunk.is_empty() {
                self.chunks.pop_front();
                self.boundary = true;
            }
            return Ok(n);
        }
        match self.end {
            End::Open => Err(io::ErrorKind::WouldBlock.into()),
            End::Closed => Ok(0),
            End::Fail(kind) => Err(kind.into()),
        }
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<Readiness> {
        self.timeouts.push(timeout);
        self.boundary = false;
        if self.interrupts > 0 {
            self.interrupts -= 1;
            return Ok(Readiness::Interrupted);
        }
        if self.chunks.is_empty() && self.end == End::Open {
            Ok(Readiness::Timeout)
        } else {
            Ok(Readiness::Readable)
        }
    }

    fn local_ip(&self) -> Option<&str> {
        self.local_ip.as_ref().map(String::as_str)
    }
}
