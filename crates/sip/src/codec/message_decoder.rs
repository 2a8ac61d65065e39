//! SIP stream decoder
//!
//! On a stream transport messages follow each other without delimiters, so
//! each one must declare its body size in Content-Length. The decoder waits
//! for a complete header block, reads the declared length, waits for the body
//! and then hands the whole frame to [`HeaderDecoder`]. A declared length above
//! [`ParseConfig::max_body_bytes`] fails before anything is reserved.
//!
//! Bare CRLFs between messages are keep-alives and are dropped.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::header::HeaderDecoder;
use crate::config::ParseConfig;
use crate::ensure;
use crate::protocol::{ParseError, SipMessage};
use crate::utils::{find_subsequence, leading_crlf_len};

const HEADER_END: &[u8] = b"\r\n\r\n";

/// A [`Decoder`] framing [`SipMessage`]s off a byte stream.
#[derive(Debug, Clone, Copy)]
pub struct MessageDecoder {
    header_decoder: HeaderDecoder,
}

impl MessageDecoder {
    /// Creates a decoder using the process-wide [`ParseConfig`].
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_config(config: ParseConfig) -> Self {
        Self { header_decoder: HeaderDecoder::new(config, true) }
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::with_config(ParseConfig::global())
    }
}

impl Decoder for MessageDecoder {
    type Item = SipMessage;
    type Error = ParseError;

    /// Attempts to decode one message from the provided buffer
    ///
    /// # Returns
    ///
    /// - `Ok(Some(message))`: a complete message was cut off the buffer
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: the stream can't be framed any more
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let keep_alive = leading_crlf_len(src);
        if keep_alive > 0 {
            trace!(size = keep_alive, "skip keep-alive");
            src.advance(keep_alive);
        }

        let max_header_bytes = self.header_decoder.config().max_header_bytes();
        let Some(header_end) = find_subsequence(src, HEADER_END) else {
            ensure!(src.len() <= max_header_bytes, ParseError::too_large_header(src.len(), max_header_bytes));
            return Ok(None);
        };

        let header_len = header_end + HEADER_END.len();
        ensure!(header_len <= max_header_bytes, ParseError::too_large_header(header_len, max_header_bytes));

        let content_length = self
            .header_decoder
            .scan_content_length(&src[..header_len])?
            .ok_or(ParseError::MissingContentLength)?;
        let max_body_bytes = self.header_decoder.config().max_body_bytes();
        ensure!(content_length <= max_body_bytes, ParseError::too_large_body(content_length, max_body_bytes));

        let frame_len = header_len
            .checked_add(content_length)
            .ok_or_else(|| ParseError::too_large_body(content_length, max_body_bytes))?;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        trace!(frame_size = frame_len, "framed sip message");
        let frame = src.split_to(frame_len).freeze();
        self.header_decoder.parse_message(frame).map(Some)
    }
}
