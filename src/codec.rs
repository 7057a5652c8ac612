use std::io;

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes, BytesMut};
use protobuf::Message;

use crate::proto::CastMessage;
use crate::session::Transport;
use crate::Error;

/// Protobuf header is a big endian u32.
pub const CAST_MESSAGE_HEADER_LENGTH: usize = 4;
/// Max message size is [64KB](https://developers.google.com/cast/docs/reference/messages).
pub const CAST_MESSAGE_PROTOBUF_MAX_LENGTH: usize = 64 << 10;
/// Capacity of the reassembly buffer, one header and one max-sized payload.
const CAST_MESSAGE_BUFFER_LENGTH: usize =
    CAST_MESSAGE_HEADER_LENGTH + CAST_MESSAGE_PROTOBUF_MAX_LENGTH;

/// Serialize a `CastMessage` into a length-prefixed frame.
pub fn encode(message: &CastMessage) -> Result<Vec<u8>, Error> {
    let buf = message.write_to_bytes()?;
    if buf.len() > CAST_MESSAGE_PROTOBUF_MAX_LENGTH {
        warn!(
            "refusing to encode message of length {}, which is larger than the max message length of {}",
            buf.len(),
            CAST_MESSAGE_PROTOBUF_MAX_LENGTH
        );
        return Err(Error::FrameTooLarge(buf.len()));
    }

    // Cast wire protocol is a 4-byte big endian length-prefixed protobuf.
    let header = &mut [0; CAST_MESSAGE_HEADER_LENGTH];
    BigEndian::write_u32(header, buf.len() as u32);

    let mut dst = BytesMut::with_capacity(CAST_MESSAGE_HEADER_LENGTH + buf.len());
    dst.put_slice(header);
    dst.put_slice(&buf);
    Ok(dst.to_vec())
}

/// A complete frame payload: one serialized `CastMessage`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    payload: Bytes,
}

impl Frame {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Parse the envelope. The payload it carries is left uninterpreted.
    pub fn message(&self) -> Result<CastMessage, Error> {
        CastMessage::parse_from_bytes(&self.payload).map_err(Error::from)
    }

    pub fn namespace(&self) -> Result<String, Error> {
        self.message().map(|mut message| message.take_namespace())
    }
}

/// `FrameReader` decodes a length-prefixed protobuf. This enum represents
/// the phase of the decoding and survives across reads that would block.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum DecodeState {
    /// Waiting to read a u32 representing the size of the next protobuf.
    Header,
    /// Reading a protobuf with a given length.
    Payload(usize),
    /// Discarding a protobuf that exceeds the max message length.
    Drain { length: usize, consumed: usize },
}

impl Default for DecodeState {
    fn default() -> Self {
        DecodeState::Header
    }
}

/// Result of one reassembly step.
#[derive(Debug, PartialEq)]
pub enum Decoded {
    /// The transport ran dry before the frame was complete.
    Pending,
    Complete(Frame),
    /// A frame with the given declared length was read and dropped.
    Oversized(usize),
    /// The peer closed the connection.
    Closed,
}

/// Resumable frame reassembly over a non-blocking transport.
///
/// The accumulator holds the header and payload bytes of the frame being
/// read. It only returns to empty once a frame completes or an oversized
/// frame has been fully drained.
#[derive(Debug)]
pub struct FrameReader {
    state: DecodeState,
    buf: Vec<u8>,
    received: usize,
    decoded_frames: u64,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self {
            state: DecodeState::default(),
            buf: vec![0; CAST_MESSAGE_BUFFER_LENGTH],
            received: 0,
            decoded_frames: 0,
        }
    }
}

impl FrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes of the current frame accumulated so far.
    pub fn received(&self) -> usize {
        self.received
    }

    /// Drop any partially read frame, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.state = DecodeState::Header;
        self.received = 0;
    }

    /// Read as much of the next frame as the transport has available.
    ///
    /// A read that would block ends the step with `Decoded::Pending`; the
    /// partial frame is kept for the next call. Read errors other than
    /// would-block are returned as-is, also keeping the partial frame.
    pub fn read_from<T: Transport + ?Sized>(&mut self, transport: &mut T) -> io::Result<Decoded> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if let Some(decoded) = self.fill(transport, CAST_MESSAGE_HEADER_LENGTH)? {
                        return Ok(decoded);
                    }
                    let length = BigEndian::read_u32(&self.buf[..CAST_MESSAGE_HEADER_LENGTH]) as usize;
                    if length > CAST_MESSAGE_PROTOBUF_MAX_LENGTH {
                        warn!(
                            "received message of length {}, which is larger than the max message length of {}",
                            length, CAST_MESSAGE_PROTOBUF_MAX_LENGTH
                        );
                        self.state = DecodeState::Drain {
                            length,
                            consumed: 0,
                        };
                    } else {
                        self.state = DecodeState::Payload(length);
                    }
                }
                DecodeState::Payload(length) => {
                    if let Some(decoded) =
                        self.fill(transport, CAST_MESSAGE_HEADER_LENGTH + length)?
                    {
                        return Ok(decoded);
                    }
                    let payload = Bytes::from(
                        &self.buf[CAST_MESSAGE_HEADER_LENGTH..CAST_MESSAGE_HEADER_LENGTH + length],
                    );
                    self.reset();
                    self.decoded_frames += 1;
                    trace!(
                        "codec decoded frame {} of length {}",
                        self.decoded_frames,
                        length
                    );
                    return Ok(Decoded::Complete(Frame { payload }));
                }
                DecodeState::Drain { length, consumed } => {
                    if consumed == length {
                        self.reset();
                        debug!("dropped oversized message of length {}", length);
                        return Ok(Decoded::Oversized(length));
                    }
                    let want = (length - consumed).min(CAST_MESSAGE_BUFFER_LENGTH);
                    match read(transport, &mut self.buf[..want])? {
                        Some(0) => return Ok(Decoded::Closed),
                        Some(n) => {
                            self.state = DecodeState::Drain {
                                length,
                                consumed: consumed + n,
                            }
                        }
                        None => return Ok(Decoded::Pending),
                    }
                }
            }
        }
    }

    /// Read until `received == target`. Returns `Some` if the step must end
    /// before that.
    fn fill<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        target: usize,
    ) -> io::Result<Option<Decoded>> {
        while self.received < target {
            match read(transport, &mut self.buf[self.received..target])? {
                Some(0) => return Ok(Some(Decoded::Closed)),
                Some(n) => self.received += n,
                None => return Ok(Some(Decoded::Pending)),
            }
        }
        Ok(None)
    }
}

/// `None` if the read would block.
fn read<T: Transport + ?Sized>(transport: &mut T, buf: &mut [u8]) -> io::Result<Option<usize>> {
    match transport.receive(buf) {
        Ok(n) => Ok(Some(n)),
        Err(ref err)
            if err.kind() == io::ErrorKind::WouldBlock
                || err.kind() == io::ErrorKind::Interrupted =>
        {
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;
    use crate::channel::{connection, heartbeat, DEFAULT_DESTINATION_ID};
    use crate::mock::MockTransport;

    fn drive(reader: &mut FrameReader, transport: &mut MockTransport) -> Decoded {
        loop {
            match reader.read_from(transport).unwrap() {
                Decoded::Pending if !transport.is_exhausted() => continue,
                decoded => return decoded,
            }
        }
    }

    fn oversized(length: usize) -> Vec<u8> {
        let mut frame = vec![0; CAST_MESSAGE_HEADER_LENGTH];
        BigEndian::write_u32(&mut frame, length as u32);
        frame.extend(std::iter::repeat(0xAB).take(length));
        frame
    }

    #[test]
    fn encode_prefixes_big_endian_length() {
        let message = heartbeat::ping().unwrap();
        let frame = encode(&message).unwrap();
        let body = message.write_to_bytes().unwrap();
        assert_eq!(CAST_MESSAGE_HEADER_LENGTH + body.len(), frame.len());
        assert_eq!(body.len() as u32, BigEndian::read_u32(&frame[..4]));
        assert_eq!(&body[..], &frame[4..]);
    }

    #[test]
    fn decode_whole_frame() {
        let message = connection::connect(DEFAULT_DESTINATION_ID).unwrap();
        let frame = encode(&message).unwrap();
        let mut transport = MockTransport::with_chunks(vec![frame.clone()]);
        let mut reader = FrameReader::new();
        match drive(&mut reader, &mut transport) {
            Decoded::Complete(decoded) => {
                assert_eq!(frame.len() - 4, decoded.len());
                assert_eq!(&frame[4..], decoded.payload());
                assert_eq!(message, decoded.message().unwrap());
                assert_eq!(
                    "urn:x-cast:com.google.cast.tp.connection",
                    decoded.namespace().unwrap()
                );
            }
            decoded => panic!("unexpected {:?}", decoded),
        }
        assert_eq!(0, reader.received());
    }

    #[test]
    fn decode_one_byte_chunks() {
        let frame = encode(&heartbeat::pong().unwrap()).unwrap();
        let chunks = frame.iter().map(|byte| vec![*byte]).collect::<Vec<_>>();
        let mut transport = MockTransport::with_chunks(chunks);
        let mut reader = FrameReader::new();
        let mut steps = 0;
        let decoded = loop {
            steps += 1;
            match reader.read_from(&mut transport).unwrap() {
                Decoded::Pending => assert_eq!(steps, reader.received()),
                decoded => break decoded,
            }
        };
        assert_eq!(frame.len(), steps);
        assert_eq!(
            Decoded::Complete(Frame {
                payload: Bytes::from(&frame[4..])
            }),
            decoded
        );
        assert_eq!(0, reader.received());
    }

    #[test]
    fn decode_split_header_and_payload() {
        let frame = encode(&heartbeat::ping().unwrap()).unwrap();
        let chunks = vec![frame[..2].to_vec(), frame[2..7].to_vec(), frame[7..].to_vec()];
        let mut transport = MockTransport::with_chunks(chunks);
        let mut reader = FrameReader::new();
        assert_eq!(Decoded::Pending, reader.read_from(&mut transport).unwrap());
        assert_eq!(2, reader.received());
        assert_eq!(Decoded::Pending, reader.read_from(&mut transport).unwrap());
        assert_eq!(7, reader.received());
        match reader.read_from(&mut transport).unwrap() {
            Decoded::Complete(decoded) => assert_eq!(&frame[4..], decoded.payload()),
            decoded => panic!("unexpected {:?}", decoded),
        }
    }

    #[test]
    fn decode_back_to_back_frames() {
        let ping = encode(&heartbeat::ping().unwrap()).unwrap();
        let pong = encode(&heartbeat::pong().unwrap()).unwrap();
        let mut both = ping.clone();
        both.extend_from_slice(&pong);
        let mut transport = MockTransport::with_chunks(vec![both]);
        let mut reader = FrameReader::new();
        match drive(&mut reader, &mut transport) {
            Decoded::Complete(decoded) => assert_eq!(&ping[4..], decoded.payload()),
            decoded => panic!("unexpected {:?}", decoded),
        }
        match drive(&mut reader, &mut transport) {
            Decoded::Complete(decoded) => assert_eq!(&pong[4..], decoded.payload()),
            decoded => panic!("unexpected {:?}", decoded),
        }
    }

    #[test]
    fn decode_max_length_payload() {
        let mut frame = vec![0; CAST_MESSAGE_HEADER_LENGTH];
        BigEndian::write_u32(&mut frame, CAST_MESSAGE_PROTOBUF_MAX_LENGTH as u32);
        frame.extend(std::iter::repeat(7).take(CAST_MESSAGE_PROTOBUF_MAX_LENGTH));
        let mut transport = MockTransport::with_chunks(vec![frame]);
        let mut reader = FrameReader::new();
        match drive(&mut reader, &mut transport) {
            Decoded::Complete(decoded) => assert_eq!(CAST_MESSAGE_PROTOBUF_MAX_LENGTH, decoded.len()),
            decoded => panic!("unexpected {:?}", decoded),
        }
    }

    #[test]
    fn drain_oversized_frame() {
        let length = CAST_MESSAGE_PROTOBUF_MAX_LENGTH + 1;
        let mut transport = MockTransport::with_chunks(vec![oversized(length)]);
        let mut reader = FrameReader::new();
        assert_eq!(Decoded::Oversized(length), drive(&mut reader, &mut transport));
        assert_eq!(0, reader.received());
        assert_eq!(0, transport.chunks_remaining());
    }

    #[test]
    fn drain_oversized_frame_across_chunks() {
        // Larger than the reassembly buffer, split at awkward boundaries.
        let length = 3 * CAST_MESSAGE_BUFFER_LENGTH + 17;
        let frame = oversized(length);
        let chunks = frame
            .chunks(CAST_MESSAGE_BUFFER_LENGTH / 3 + 1)
            .map(<[u8]>::to_vec)
            .collect::<Vec<_>>();
        let mut transport = MockTransport::with_chunks(chunks);
        let mut reader = FrameReader::new();
        assert_eq!(Decoded::Oversized(length), drive(&mut reader, &mut transport));
        assert_eq!(0, reader.received());
    }

    #[test]
    fn session_continues_after_oversized_frame() {
        let ping = encode(&heartbeat::ping().unwrap()).unwrap();
        let mut bytes = oversized(CAST_MESSAGE_PROTOBUF_MAX_LENGTH + 100);
        bytes.extend_from_slice(&ping);
        let mut transport = MockTransport::with_chunks(vec![bytes]);
        let mut reader = FrameReader::new();
        assert_eq!(
            Decoded::Oversized(CAST_MESSAGE_PROTOBUF_MAX_LENGTH + 100),
            drive(&mut reader, &mut transport)
        );
        match drive(&mut reader, &mut transport) {
            Decoded::Complete(decoded) => assert_eq!(&ping[4..], decoded.payload()),
            decoded => panic!("unexpected {:?}", decoded),
        }
    }

    #[test]
    fn closed_mid_frame_keeps_partial_count() {
        let frame = encode(&heartbeat::ping().unwrap()).unwrap();
        let mut transport = MockTransport::with_chunks(vec![frame[..6].to_vec()]);
        transport.close_after_chunks();
        let mut reader = FrameReader::new();
        assert_eq!(Decoded::Closed, drive(&mut reader, &mut transport));
        assert_eq!(6, reader.received());
    }

    #[test]
    fn read_error_propagates_and_keeps_partial_count() {
        let frame = encode(&heartbeat::ping().unwrap()).unwrap();
        let mut transport = MockTransport::with_chunks(vec![frame[..3].to_vec()]);
        transport.fail_after_chunks(io::ErrorKind::ConnectionReset);
        let mut reader = FrameReader::new();
        assert_eq!(Decoded::Pending, reader.read_from(&mut transport).unwrap());
        let err = reader.read_from(&mut transport).unwrap_err();
        assert_eq!(io::ErrorKind::ConnectionReset, err.kind());
        assert_eq!(3, reader.received());
    }
}
