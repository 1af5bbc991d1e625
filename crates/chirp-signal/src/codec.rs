use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::SignalError;

/// Upper bound for a single inbound line (attachments are never inlined).
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Newline-delimited frame codec.
///
/// Bytes are buffered across reads; only complete `\n`-terminated lines
/// are yielded, so a frame split over several reads is reassembled and
/// several frames in one read come out one by one. A trailing `\r` is
/// stripped.
#[derive(Debug, Clone)]
pub struct SignalCodec {
    /// How far into the buffer we already searched for `\n`.
    scanned: usize,
    max_len: usize,
}

impl SignalCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            scanned: 0,
            max_len,
        }
    }
}

impl Default for SignalCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SignalCodec {
    type Item = String;
    type Error = SignalError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, SignalError> {
        let Some(offset) = buf[self.scanned..].iter().position(|b| *b == b'\n') else {
            self.scanned = buf.len();
            if buf.len() > self.max_len {
                return Err(SignalError::FrameTooLong { max: self.max_len });
            }
            return Ok(None);
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_len {
            return Err(SignalError::FrameTooLong { max: self.max_len });
        }

        let mut line = buf.split_to(end + 1);
        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }
        // A malformed line is discarded like unparsable JSON; the empty
        // frame is skipped downstream.
        match String::from_utf8(line.to_vec()) {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                tracing::debug!(error = %e, "discarding non-UTF-8 signal frame");
                Ok(Some(String::new()))
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, SignalError> {
        match self.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                // An unterminated tail at EOF is an incomplete frame.
                if buf.has_remaining() {
                    tracing::debug!(bytes = buf.len(), "dropping partial signal frame at EOF");
                    buf.clear();
                }
                self.scanned = 0;
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for SignalCodec {
    type Error = SignalError;

    fn encode(&mut self, frame: String, dst: &mut BytesMut) -> Result<(), SignalError> {
        dst.reserve(frame.len() + 1);
        dst.put_slice(frame.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}
