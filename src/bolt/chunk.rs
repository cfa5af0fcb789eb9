//! Chunked message framing.
//!
//! Bolt transfers each PackStream message as a run of chunks. A chunk is a
//! big-endian `u16` length followed by that many payload bytes; a
//! zero-length chunk marks the end of the message. The [`Chunker`] splits
//! outbound payloads, the [`Dechunker`] reassembles inbound ones, both as
//! [`tokio_util::codec`] implementations.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::error::BoltError;

/// Largest payload a single chunk can carry.
pub const MAX_CHUNK_SIZE: usize = 65_535;

/// Default cap on a reassembled message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// The zero-length chunk terminating a message.
pub const MESSAGE_BOUNDARY: [u8; 2] = [0x00, 0x00];

/// Splits message payloads into length-prefixed chunks.
///
/// Every encoded message ends with its own boundary marker, so two messages
/// are never coalesced without a separator between them.
#[derive(Debug, Default)]
pub struct Chunker;

impl Chunker {
    /// Create a chunker.
    pub fn new() -> Self {
        Self
    }
}

impl<'a> Encoder<&'a [u8]> for Chunker {
    type Error = BoltError;

    fn encode(&mut self, payload: &'a [u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(payload.len() + 2 * (payload.len() / MAX_CHUNK_SIZE + 2));

        for chunk in payload.chunks(MAX_CHUNK_SIZE) {
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
        }
        dst.put_slice(&MESSAGE_BOUNDARY);
        Ok(())
    }
}

/// Reassembles chunked messages from an inbound byte stream.
///
/// Input may be split arbitrarily: one buffer can carry the tail of a
/// message, several whole messages and the head of the next, and a single
/// message can span any number of buffers. A boundary with no accumulated
/// payload is tolerated as transport noise and skipped.
#[derive(Debug)]
pub struct Dechunker {
    message: BytesMut,
    max_message_size: usize,
}

impl Dechunker {
    /// Create a dechunker with the default message size cap.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a dechunker with a custom message size cap.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            message: BytesMut::with_capacity(4096),
            max_message_size,
        }
    }
}

impl Default for Dechunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Dechunker {
    type Item = BytesMut;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_len = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_len == 0 {
                src.advance(2);
                if self.message.is_empty() {
                    continue;
                }
                return Ok(Some(self.message.split()));
            }

            if src.len() < 2 + chunk_len {
                return Ok(None);
            }

            let size = self.message.len() + chunk_len;
            if size > self.max_message_size {
                return Err(BoltError::MessageTooLarge {
                    size,
                    max: self.max_message_size,
                });
            }

            src.advance(2);
            self.message.extend_from_slice(&src[..chunk_len]);
            src.advance(chunk_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(payload: &[u8]) -> BytesMut {
        let mut out = BytesMut::new();
        Chunker::new().encode(payload, &mut out).unwrap();
        out
    }

    #[test]
    fn test_chunk_small_message() {
        let out = chunked(&[0x01, 0x02, 0x03]);
        assert_eq!(&out[..], &[0x00, 0x03, 0x01, 0x02, 0x03, 0x00, 0x00]);
    }

    #[test]
    fn test_chunk_empty_payload() {
        let out = chunked(&[]);
        assert_eq!(&out[..], &MESSAGE_BOUNDARY);
    }

    #[test]
    fn test_chunk_splits_at_max_size() {
        let payload = vec![0xAB; MAX_CHUNK_SIZE + 10];
        let out = chunked(&payload);

        // First chunk: full size.
        assert_eq!(&out[..2], &[0xFF, 0xFF]);
        // Second chunk header sits right after the first chunk's payload.
        let second = 2 + MAX_CHUNK_SIZE;
        assert_eq!(&out[second..second + 2], &[0x00, 0x0A]);
        // Trailing boundary.
        assert_eq!(&out[out.len() - 2..], &MESSAGE_BOUNDARY);
        assert_eq!(out.len(), 2 + MAX_CHUNK_SIZE + 2 + 10 + 2);
    }

    #[test]
    fn test_two_messages_not_coalesced() {
        let mut out = BytesMut::new();
        let mut chunker = Chunker::new();
        chunker.encode(&[0x01][..], &mut out).unwrap();
        chunker.encode(&[0x02][..], &mut out).unwrap();
        assert_eq!(
            &out[..],
            &[0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00]
        );
    }

    #[test]
    fn test_dechunk_whole_message() {
        let mut src = chunked(&[0x01, 0x02, 0x03]);
        let mut dechunker = Dechunker::new();
        let message = dechunker.decode(&mut src).unwrap().unwrap();
        assert_eq!(&message[..], &[0x01, 0x02, 0x03]);
        assert!(dechunker.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_dechunk_byte_at_a_time() {
        let wire = chunked(b"split me");
        let mut dechunker = Dechunker::new();
        let mut src = BytesMut::new();
        let mut messages = Vec::new();

        for byte in wire.iter() {
            src.put_u8(*byte);
            while let Some(message) = dechunker.decode(&mut src).unwrap() {
                messages.push(message);
            }
        }

        assert_eq!(messages.len(), 1);
        assert_eq!(&messages[0][..], b"split me");
    }

    #[test]
    fn test_dechunk_multiple_messages_one_buffer() {
        let mut src = BytesMut::new();
        let mut chunker = Chunker::new();
        chunker.encode(&[0x0A][..], &mut src).unwrap();
        chunker.encode(&[0x0B, 0x0C][..], &mut src).unwrap();
        chunker.encode(&[0x0D][..], &mut src).unwrap();

        let mut dechunker = Dechunker::new();
        assert_eq!(&dechunker.decode(&mut src).unwrap().unwrap()[..], &[0x0A]);
        assert_eq!(
            &dechunker.decode(&mut src).unwrap().unwrap()[..],
            &[0x0B, 0x0C]
        );
        assert_eq!(&dechunker.decode(&mut src).unwrap().unwrap()[..], &[0x0D]);
        assert!(dechunker.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_dechunk_message_spanning_chunks() {
        let payload = vec![0x5A; MAX_CHUNK_SIZE * 2 + 17];
        let mut src = chunked(&payload);
        let mut dechunker = Dechunker::new();
        let message = dechunker.decode(&mut src).unwrap().unwrap();
        assert_eq!(&message[..], &payload[..]);
    }

    #[test]
    fn test_dechunk_skips_stray_boundary() {
        let mut src = BytesMut::new();
        src.put_slice(&MESSAGE_BOUNDARY);
        Chunker::new().encode(&[0x42][..], &mut src).unwrap();

        let mut dechunker = Dechunker::new();
        let message = dechunker.decode(&mut src).unwrap().unwrap();
        assert_eq!(&message[..], &[0x42]);
    }

    #[test]
    fn test_dechunk_enforces_max_size() {
        let mut src = BytesMut::new();
        src.put_u16(200);
        src.put_slice(&[0u8; 200]);

        let mut dechunker = Dechunker::with_max_size(100);
        let err = dechunker.decode(&mut src).unwrap_err();
        assert!(matches!(err, BoltError::MessageTooLarge { .. }));
    }

    #[test]
    fn test_roundtrip_arbitrary_payloads() {
        let mut chunker = Chunker::new();
        for len in [1usize, 2, 255, 256, 65_534, 65_535, 65_536, 200_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut src = BytesMut::new();
            chunker.encode(&payload[..], &mut src).unwrap();

            let mut dechunker = Dechunker::new();
            let message = dechunker.decode(&mut src).unwrap().unwrap();
            assert_eq!(&message[..], &payload[..], "payload length {}", len);
            assert!(src.is_empty());
        }
    }
}
