//! # Frame Codec
//!
//! Length-prefixed framing over any byte stream. A frame is written as the payload length in
//! ASCII decimal, a `:` delimiter, then the raw payload bytes:
//!
//! ```text
//! 5:hello
//! ```
//!
//! The payload is opaque to the codec, it may contain any bytes (including the delimiter) and may
//! be empty. The receiving side keeps a buffer of unconsumed bytes for the lifetime of the
//! connection, so frames split over many reads, or many frames arriving in a single read, are
//! both reassembled correctly.
//!
//! The codec also carries unframed newline-terminated text lines, which share the same receive
//! buffer. Which rule applies to a given direction of a connection is a matter of convention
//! between the two endpoints, see [`super::link`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::{ErrorKind, Read, Write};

use log::{trace, warn};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The byte separating the length prefix from the payload.
pub const DELIMITER: u8 = b':';

/// The byte terminating an unframed text line.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Maximum number of digits accepted in a length prefix.
pub const MAX_HEADER_LEN: usize = 20;

/// Default limit on the declared length of a frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Default limit on the length of an unframed line.
pub const DEFAULT_MAX_LINE_LEN: usize = 4096;

/// Number of bytes requested from the stream on each read.
const READ_CHUNK_SIZE: usize = 1024;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: Vec<u8>,
}

/// Codec bound to one byte stream.
///
/// The codec owns the stream and the receive buffer. Dropping the codec drops both.
pub struct FrameCodec<S> {
    stream: S,

    /// Bytes which have been read from the stream but not yet consumed.
    buffer: Vec<u8>,

    /// Length of the frame currently being received, once its prefix has been parsed.
    pending_len: Option<usize>,

    max_frame_len: usize,

    max_line_len: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Result of a decode operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// A complete item was decoded.
    Item(T),

    /// The peer closed the connection.
    EndOfStream,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Could not read from the stream: {0}")]
    ReadError(std::io::Error),

    #[error("Could not write to the stream: {0}")]
    WriteError(std::io::Error),

    #[error("The length prefix {0:?} is not an unsigned decimal number")]
    MalformedLength(String),

    #[error("Declared frame length {len} exceeds the limit of {max} bytes")]
    FrameTooLarge { len: u64, max: usize },

    #[error("No length delimiter found within the first {0} bytes")]
    DelimiterNotFound(usize),

    #[error("Payload of {len} bytes exceeds the limit of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("No line terminator found within {0} bytes")]
    LineTooLong(usize),

    #[error("The received line is not valid UTF-8")]
    NonUtf8Line,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Frame {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl<S> FrameCodec<S> {
    /// Create a new codec over the given stream using the default limits.
    pub fn new(stream: S) -> Self {
        Self::with_limits(stream, DEFAULT_MAX_FRAME_LEN, DEFAULT_MAX_LINE_LEN)
    }

    /// Create a new codec with explicit limits on frame and line length.
    pub fn with_limits(stream: S, max_frame_len: usize, max_line_len: usize) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            pending_len: None,
            max_frame_len,
            max_line_len,
        }
    }

    /// Number of received bytes not yet consumed by a decode.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the codec, returning the stream. Any buffered bytes are discarded.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Attempt to take a complete frame out of the buffer without reading.
    fn take_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        let len = match self.pending_len {
            Some(l) => l,
            None => {
                let pos = match self
                    .buffer
                    .iter()
                    .take(MAX_HEADER_LEN + 1)
                    .position(|&b| b == DELIMITER)
                {
                    Some(p) => p,
                    None if self.buffer.len() > MAX_HEADER_LEN => {
                        return Err(FrameError::DelimiterNotFound(MAX_HEADER_LEN))
                    }
                    None => return Ok(None),
                };

                let len = parse_length(&self.buffer[..pos], self.max_frame_len)?;

                // Drop the prefix and the delimiter
                self.buffer.drain(..=pos);
                self.pending_len = Some(len);

                trace!("Frame header parsed, expecting {} bytes", len);

                len
            }
        };

        if self.buffer.len() < len {
            return Ok(None);
        }

        let payload: Vec<u8> = self.buffer.drain(..len).collect();
        self.pending_len = None;

        Ok(Some(Frame { payload }))
    }
}

impl<S: Read> FrameCodec<S> {
    /// Decode the next frame from the stream.
    ///
    /// Blocks until a complete frame has been received or the peer closes the connection.
    /// Bytes received past the end of the returned frame are kept for the next call.
    pub fn decode_next(&mut self) -> Result<Decoded<Frame>, FrameError> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(Decoded::Item(frame));
            }

            if self.fill()? == 0 {
                if !self.buffer.is_empty() || self.pending_len.is_some() {
                    warn!(
                        "Stream closed partway through a frame, discarding {} bytes",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                    self.pending_len = None;
                }
                return Ok(Decoded::EndOfStream);
            }
        }
    }

    /// Decode the next unframed text line from the stream.
    ///
    /// The terminating `\n` (and a preceding `\r`) are stripped. If the peer closes the
    /// connection after sending an unterminated line that line is returned, and the following
    /// call returns `EndOfStream`.
    pub fn decode_line(&mut self) -> Result<Decoded<String>, FrameError> {
        let mut searched = 0;

        loop {
            if let Some(pos) = self.buffer[searched..]
                .iter()
                .position(|&b| b == LINE_TERMINATOR)
            {
                let end = searched + pos;
                if end > self.max_line_len {
                    return Err(FrameError::LineTooLong(self.max_line_len));
                }

                let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return line_to_string(line).map(Decoded::Item);
            }

            searched = self.buffer.len();
            if searched > self.max_line_len {
                return Err(FrameError::LineTooLong(self.max_line_len));
            }

            if self.fill()? == 0 {
                if self.buffer.is_empty() {
                    return Ok(Decoded::EndOfStream);
                }
                if self.buffer.len() > self.max_line_len {
                    return Err(FrameError::LineTooLong(self.max_line_len));
                }
                let line = std::mem::take(&mut self.buffer);
                return line_to_string(line).map(Decoded::Item);
            }
        }
    }

    /// Perform a single read from the stream into the buffer, returning the number of bytes
    /// read. Zero means the peer closed the connection.
    fn fill(&mut self) -> Result<usize, FrameError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            match self.stream.read(&mut chunk) {
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(FrameError::ReadError(e)),
            }
        }
    }
}

impl<S: Write> FrameCodec<S> {
    /// Encode the payload as a frame and write it to the stream.
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        if payload.len() > self.max_frame_len {
            return Err(FrameError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_frame_len,
            });
        }

        self.send_raw(&encode(payload))
    }

    /// Write bytes to the stream without any framing.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        self.stream
            .write_all(bytes)
            .and_then(|_| self.stream.flush())
            .map_err(FrameError::WriteError)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Encode a payload as a frame: `"<decimal length>:" + payload`.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let header = format!("{}:", payload.len());

    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);

    out
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a length prefix, which must be a non-empty run of ASCII digits no greater than `max`.
fn parse_length(digits: &[u8], max: usize) -> Result<usize, FrameError> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(FrameError::MalformedLength(
            String::from_utf8_lossy(digits).into_owned(),
        ));
    }

    let len = digits
        .iter()
        .try_fold(0u64, |acc, &d| {
            acc.checked_mul(10)?.checked_add(u64::from(d - b'0'))
        })
        .ok_or(FrameError::FrameTooLarge { len: u64::MAX, max })?;

    if len > max as u64 {
        return Err(FrameError::FrameTooLarge { len, max });
    }

    Ok(len as usize)
}

fn line_to_string(line: Vec<u8>) -> Result<String, FrameError> {
    String::from_utf8(line).map_err(|_| FrameError::NonUtf8Line)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
