//! P3 container codec
//!
//! Serializes and deserializes the P3 frame format: a flat stream of
//! `[type:u8][reserved:u8][len:u16 BE][payload:len bytes]` frames with no
//! outer header, footer, or checksum. Frame boundaries are discovered purely
//! by sequential header parsing, so streams are consumed strictly in order
//! and restarted only by reopening the source.
//!
//! A truncated trailing frame (incomplete header, or a payload shorter than
//! its declared length) terminates decoding silently. Writers that crash
//! mid-frame therefore leave a file whose intact prefix still plays.

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest payload representable by the 16-bit length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Packet type written by all current producers.
pub const PACKET_TYPE_AUDIO: u8 = 0;

/// One unit of a P3 stream.
///
/// `packet_type` and `reserved` are carried uninterpreted; current producers
/// always write `0`/`0`, and readers pass other values through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct P3Frame {
    pub packet_type: u8,
    pub reserved: u8,
    pub payload: Vec<u8>,
}

impl P3Frame {
    /// Create a frame, guarding the 16-bit length field.
    pub fn new(packet_type: u8, reserved: u8, payload: Vec<u8>) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        Ok(Self {
            packet_type,
            reserved,
            payload,
        })
    }

    /// Create an audio frame (`type=0`, `reserved=0`).
    pub fn audio(payload: Vec<u8>) -> Result<Self> {
        Self::new(PACKET_TYPE_AUDIO, 0, payload)
    }

    /// Total encoded size: header plus payload.
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_LEN + self.payload.len()
    }

    /// Serialize the frame to its wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.packet_type);
        buf.push(self.reserved);
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Encode a single frame to bytes.
///
/// Fails with [`Error::PayloadTooLarge`] when the payload exceeds 65535 bytes.
pub fn encode_frame(packet_type: u8, reserved: u8, payload: &[u8]) -> Result<Vec<u8>> {
    P3Frame::new(packet_type, reserved, payload.to_vec()).map(|f| f.to_bytes())
}

/// Read as many bytes as possible into `buf`, retrying on interruption.
///
/// Returns the number of bytes actually read; fewer than `buf.len()` means
/// end of stream.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Lazy pull-based frame decoder over any byte source.
///
/// Yields frames in stream order. Iteration ends when fewer than four header
/// bytes remain or the declared payload cannot be read in full; the truncated
/// remainder is dropped. Genuine I/O failures (anything other than running
/// out of bytes) surface once as `Err`, after which the iterator is fused.
pub struct FrameReader<R: Read> {
    inner: R,
    finished: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            finished: false,
        }
    }

    /// Consume the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_frame(&mut self) -> Result<Option<P3Frame>> {
        let mut header = [0u8; FRAME_HEADER_LEN];
        let got = read_up_to(&mut self.inner, &mut header)
            .map_err(|e| Error::Source(format!("Failed to read frame header: {}", e)))?;
        if got < FRAME_HEADER_LEN {
            // Clean end of stream, or a partial header left by an interrupted
            // writer. Either way the stream is over.
            return Ok(None);
        }

        let payload_len = u16::from_be_bytes([header[2], header[3]]) as usize;
        let mut payload = vec![0u8; payload_len];
        let got = read_up_to(&mut self.inner, &mut payload)
            .map_err(|e| Error::Source(format!("Failed to read frame payload: {}", e)))?;
        if got < payload_len {
            // Truncated trailing payload: drop it.
            return Ok(None);
        }

        Ok(Some(P3Frame {
            packet_type: header[0],
            reserved: header[1],
            payload,
        }))
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<P3Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Sequential frame writer over any byte sink.
pub struct FrameWriter<W: Write> {
    inner: W,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            frames_written: 0,
            bytes_written: 0,
        }
    }

    /// Append one frame to the stream.
    pub fn write_frame(&mut self, frame: &P3Frame) -> Result<()> {
        self.inner
            .write_all(&frame.to_bytes())
            .map_err(|e| Error::Sink(format!("Failed to write frame: {}", e)))?;
        self.frames_written += 1;
        self.bytes_written += frame.encoded_len() as u64;
        Ok(())
    }

    /// Append one audio frame (`type=0`, `reserved=0`).
    pub fn write_audio(&mut self, payload: &[u8]) -> Result<()> {
        let frame = P3Frame::audio(payload.to_vec())?;
        self.write_frame(&frame)
    }

    /// Flush the underlying sink.
    pub fn finish(&mut self) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| Error::Sink(format!("Failed to flush frame stream: {}", e)))
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(bytes: Vec<u8>) -> Vec<P3Frame> {
        FrameReader::new(Cursor::new(bytes))
            .map(|f| f.expect("unexpected read error"))
            .collect()
    }

    #[test]
    fn test_round_trip_preserves_type_and_reserved() {
        let frames = vec![
            P3Frame::new(0, 0, vec![1, 2, 3]).unwrap(),
            P3Frame::new(7, 42, vec![]).unwrap(),
            P3Frame::new(255, 1, vec![0; 1000]).unwrap(),
        ];

        let mut bytes = Vec::new();
        for f in &frames {
            bytes.extend_from_slice(&f.to_bytes());
        }

        assert_eq!(collect(bytes), frames);
    }

    #[test]
    fn test_oversize_payload_rejected() {
        assert!(P3Frame::audio(vec![0u8; MAX_PAYLOAD_LEN]).is_ok());

        let err = P3Frame::audio(vec![0u8; MAX_PAYLOAD_LEN + 1]).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(n) if n == MAX_PAYLOAD_LEN + 1));
    }

    #[test]
    fn test_partial_trailing_header_is_silent_eof() {
        let valid = encode_frame(0, 0, &[9, 8, 7]).unwrap();

        for extra in 1..FRAME_HEADER_LEN {
            let mut bytes = valid.clone();
            bytes.extend(std::iter::repeat(0xAB).take(extra));

            let frames = collect(bytes);
            assert_eq!(frames.len(), 1, "{extra} extra bytes should be dropped");
            assert_eq!(frames[0].payload, vec![9, 8, 7]);
        }
    }

    #[test]
    fn test_truncated_payload_is_silent_eof() {
        let mut bytes = encode_frame(0, 0, &[1, 2, 3, 4]).unwrap();
        // Header declaring 100 payload bytes, with only 5 present.
        bytes.extend_from_slice(&[0, 0, 0, 100]);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);

        let frames = collect(bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_stream_yields_nothing() {
        assert!(collect(Vec::new()).is_empty());
    }

    #[test]
    fn test_empty_payload_frame_round_trips() {
        let bytes = encode_frame(3, 9, &[]).unwrap();
        assert_eq!(bytes.len(), FRAME_HEADER_LEN);

        let frames = collect(bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].packet_type, 3);
        assert_eq!(frames[0].reserved, 9);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn test_writer_counts_frames_and_bytes() {
        let mut out = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut out);
            writer.write_audio(&[1, 2]).unwrap();
            writer.write_audio(&[3]).unwrap();
            writer.finish().unwrap();
            assert_eq!(writer.frames_written(), 2);
            assert_eq!(writer.bytes_written(), 11);
        }
        assert_eq!(out.len(), 11);
    }
}
