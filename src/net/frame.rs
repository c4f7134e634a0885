use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::net::cursor::{ByteCursor, Endian, WireError};

pub const COMPRESSED_FRAME: u8 = 0x0a;
pub const CHANNEL_CLIENT_ENTITY: u8 = 0x01;
pub const STREAM_BEGIN: u8 = 0x07;
pub const STREAM_END: u8 = 0x06;
pub const DEFAULT_MAX_FRAME: usize = 0x10000;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("connection closed")]
    Closed,
    #[error("frame of {len} bytes exceeds limit {max}")]
    TooLarge { len: usize, max: usize },
    #[error("not a compressed frame: kind {0:#04x}")]
    UnexpectedKind(u8),
    #[error("length mismatch: header says {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Accumulates one tick's client-entity fragments between the begin and
/// end markers.
#[derive(Debug, Default)]
pub struct ClientEntityStream {
    buffer: Vec<u8>,
    open: bool,
}

impl ClientEntityStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn begin(&mut self) {
        self.buffer.clear();
        self.buffer.push(STREAM_BEGIN);
        self.open = true;
    }

    pub fn push(&mut self, fragment: &[u8]) {
        if !self.open {
            self.begin();
        }
        self.buffer.extend_from_slice(fragment);
    }

    /// Closes the window. Returns `07 <fragments> 06`, or None when nothing
    /// was pushed.
    pub fn end(&mut self) -> Option<Vec<u8>> {
        let pushed = self.open && self.buffer.len() > 1;
        self.open = false;
        if !pushed {
            self.buffer.clear();
            return None;
        }
        self.buffer.push(STREAM_END);
        Some(std::mem::take(&mut self.buffer))
    }
}

/// `[0x0a][u32 len of rest][u8 channel][u32 uncompressed len][zlib body]`,
/// lengths little-endian.
pub fn compress_frame(channel: u8, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(body.len() / 2 + 16), Compression::default());
    encoder.write_all(body)?;
    let compressed = encoder.finish()?;

    let mut cursor = ByteCursor::with_capacity(Endian::Little, compressed.len() + 10);
    cursor.write_u8(COMPRESSED_FRAME);
    cursor.write_u32((compressed.len() + 5) as u32);
    cursor.write_u8(channel);
    cursor.write_u32(body.len() as u32);
    cursor.write_bytes(&compressed);
    Ok(cursor.into_inner())
}

/// Inverse of `compress_frame`; returns the channel and the body.
pub fn decompress_frame(frame: &[u8]) -> Result<(u8, Vec<u8>), FrameError> {
    let mut cursor = ByteCursor::new(Endian::Little, frame.to_vec());
    let kind = cursor.read_u8()?;
    if kind != COMPRESSED_FRAME {
        return Err(FrameError::UnexpectedKind(kind));
    }
    let len = cursor.read_u32()? as usize;
    if len != cursor.remaining() {
        return Err(FrameError::LengthMismatch {
            expected: len,
            actual: cursor.remaining(),
        });
    }
    let channel = cursor.read_u8()?;
    let expected = cursor.read_u32()? as usize;
    let compressed = cursor.read_bytes(cursor.remaining())?;
    let mut body = Vec::with_capacity(expected);
    ZlibDecoder::new(compressed).read_to_end(&mut body)?;
    if body.len() != expected {
        return Err(FrameError::LengthMismatch {
            expected,
            actual: body.len(),
        });
    }
    Ok((channel, body))
}

#[derive(Debug)]
pub struct InboundFrame {
    pub kind: u8,
    pub payload: ByteCursor,
}

/// Reads `[u8 kind][u32 LE len][payload]`. End of stream before the first
/// header byte is `Closed`.
pub fn read_frame<R: Read>(reader: &mut R, max: usize) -> Result<InboundFrame, FrameError> {
    let mut header = [0u8; 5];
    let mut filled = 0;
    while filled < header.len() {
        let read = reader.read(&mut header[filled..])?;
        if read == 0 {
            return Err(if filled == 0 {
                FrameError::Closed
            } else {
                FrameError::Io(std::io::ErrorKind::UnexpectedEof.into())
            });
        }
        filled += read;
    }
    let kind = header[0];
    let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if len > max {
        return Err(FrameError::TooLarge { len, max });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(InboundFrame {
        kind,
        payload: ByteCursor::new(Endian::Little, payload),
    })
}

pub fn write_frame<W: Write>(writer: &mut W, kind: u8, payload: &[u8]) -> std::io::Result<()> {
    let mut header = [0u8; 5];
    header[0] = kind;
    header[1..].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    writer.write_all(&header)?;
    writer.write_all(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn stream_brackets_fragments() {
        let mut stream = ClientEntityStream::new();
        stream.begin();
        stream.push(&[0x35, 0x01, 0x00]);
        stream.push(&[0x05, 0x02, 0x00]);
        assert_eq!(
            stream.end(),
            Some(vec![0x07, 0x35, 0x01, 0x00, 0x05, 0x02, 0x00, 0x06])
        );
        assert!(!stream.is_open());
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut stream = ClientEntityStream::new();
        stream.begin();
        assert_eq!(stream.end(), None);
        assert_eq!(stream.end(), None);
    }

    #[test]
    fn compressed_frame_layout() {
        let body = b"hello hello hello hello".to_vec();
        let frame = compress_frame(CHANNEL_CLIENT_ENTITY, &body).unwrap();
        assert_eq!(frame[0], COMPRESSED_FRAME);
        let len = u32::from_le_bytes([frame[1], frame[2], frame[3], frame[4]]) as usize;
        assert_eq!(len, frame.len() - 5);
        assert_eq!(frame[5], CHANNEL_CLIENT_ENTITY);
        assert_eq!(&frame[6..10], &(body.len() as u32).to_le_bytes());
        assert_eq!(decompress_frame(&frame).unwrap(), (CHANNEL_CLIENT_ENTITY, body));
    }

    #[test]
    fn decompress_rejects_other_kinds() {
        assert!(matches!(
            decompress_frame(&[0x02, 0, 0, 0, 0]),
            Err(FrameError::UnexpectedKind(0x02))
        ));
    }

    #[test]
    fn read_frame_hands_out_le_cursor() {
        let mut raw = Vec::new();
        write_frame(&mut raw, 0x03, &[0x10, 0x00, 0x00, 0x00]).unwrap();
        let mut reader = Cursor::new(raw);
        let mut frame = read_frame(&mut reader, DEFAULT_MAX_FRAME).unwrap();
        assert_eq!(frame.kind, 0x03);
        assert_eq!(frame.payload.read_u32().unwrap(), 0x10);
        assert!(matches!(
            read_frame(&mut reader, DEFAULT_MAX_FRAME),
            Err(FrameError::Closed)
        ));
    }

    #[test]
    fn read_frame_enforces_limit() {
        let mut raw = Vec::new();
        write_frame(&mut raw, 0x01, &[0u8; 32]).unwrap();
        assert!(matches!(
            read_frame(&mut Cursor::new(raw), 16),
            Err(FrameError::TooLarge { len: 32, max: 16 })
        ));
    }

    #[test]
    fn truncated_payload_is_io_error() {
        let raw = vec![0x01, 0x08, 0x00, 0x00, 0x00, 0xaa];
        assert!(matches!(
            read_frame(&mut Cursor::new(raw), 64),
            Err(FrameError::Io(_))
        ));
    }
}
