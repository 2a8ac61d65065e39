//! SIP message decoder for complete buffers
//!
//! This module turns one complete message (a UDP datagram, a frame cut by the
//! stream decoder, or a `message/sipfrag` body) into a [`SipMessage`].
//!
//! # Implementation Details
//!
//! The decoder works in multiple stages:
//!
//! 1. Skip leading CRLFs and split off the start line
//! 2. Parse the header block using `httparse`
//! 3. Record header name/value byte ranges
//! 4. Hand the buffer to the message arena and store the ranges as raw fields
//! 5. Cut the body according to Content-Length
//!
//! No header value is parsed here. The buffer is moved into the message as is,
//! so the raw fields point straight into the received bytes.
//!
//! A malformed start line does not fail decoding: the message is returned
//! marked invalid so that the caller can still answer it.

use bytes::{Buf, Bytes, BytesMut};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::config::ParseConfig;
use crate::ensure;
use crate::protocol::{HeaderType, ParseError, SipMessage, StartLine};
use crate::utils::{find_subsequence, leading_crlf_len};

const CRLF: &[u8] = b"\r\n";

/// Decoder for complete SIP messages.
///
/// As a [`Decoder`] it treats everything in the source buffer as one message,
/// which is what a datagram transport hands over.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    config: ParseConfig,
    is_external: bool,
}

impl HeaderDecoder {
    pub fn new(config: ParseConfig, is_external: bool) -> Self {
        Self { config, is_external }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Decodes one complete message.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if:
    /// - The buffer is empty or the header block is not terminated
    /// - The number of headers exceeds the configured limit
    /// - The header block exceeds the configured size
    /// - A header line is syntactically broken
    /// - Content-Length is not a number
    pub fn parse_message(&self, bytes: Bytes) -> Result<SipMessage, ParseError> {
        self.decode_buffer(bytes, false)
    }

    /// Decodes a `message/sipfrag` body. The start line may be missing, and
    /// the blank line closing the header block is added when absent.
    pub fn parse_fragment(&self, bytes: Bytes) -> Result<SipMessage, ParseError> {
        let mut result = self.decode_buffer(bytes.clone(), true);
        for padding in [CRLF, b"\r\n\r\n"] {
            if !matches!(result, Err(ParseError::Incomplete { .. })) {
                break;
            }
            trace!(padding = padding.len(), "retry sipfrag with a terminated header block");
            let mut padded = BytesMut::with_capacity(bytes.len() + padding.len());
            padded.extend_from_slice(&bytes);
            padded.extend_from_slice(padding);
            result = self.decode_buffer(padded.freeze(), true);
        }
        result
    }

    fn decode_buffer(&self, bytes: Bytes, fragment: bool) -> Result<SipMessage, ParseError> {
        let bytes = bytes.slice(leading_crlf_len(&bytes)..);
        ensure!(!bytes.is_empty(), ParseError::incomplete("empty message"));

        let line_end = find_subsequence(&bytes, CRLF).ok_or_else(|| ParseError::incomplete("start line is not terminated"))?;
        let first_line = &bytes[..line_end];

        let mut message = SipMessage::new(self.is_external);
        let header_start = if fragment && !is_start_line(first_line) {
            0
        } else {
            message.set_start_line(first_line);
            line_end + CRLF.len()
        };

        let head = &bytes[header_start..];
        let mut headers = vec![httparse::EMPTY_HEADER; self.config.max_headers()];
        let (header_len, parsed) = if fragment && head.is_empty() {
            (0, &headers[..0])
        } else {
            match httparse::parse_headers(head, &mut headers).map_err(|e| self.map_error(e))? {
                Status::Complete((header_len, parsed)) => (header_len, parsed),
                Status::Partial => return Err(ParseError::incomplete("header block is not terminated")),
            }
        };

        let body_offset = header_start + header_len;
        let max_header_bytes = self.config.max_header_bytes();
        ensure!(body_offset <= max_header_bytes, ParseError::too_large_header(body_offset, max_header_bytes));

        let mut header_index = vec![EMPTY_HEADER_INDEX; parsed.len()];
        HeaderIndex::record(&bytes, parsed, &mut header_index);

        // the arena takes the received buffer, every range below points into it
        let whole = message.arena.push(bytes.clone());
        let mut content_length = None;
        for (header, index) in parsed.iter().zip(&header_index) {
            if HeaderType::from_name(header.name) == Some(HeaderType::ContentLength) {
                content_length = Some(parse_content_length(header.value)?);
            }
            let name = message.arena.range(whole, index.name.0, index.name.1);
            let value = message.arena.range(whole, index.value.0, index.value.1);
            message.add_raw_field(header.name, name, value);
        }

        let available = bytes.len() - body_offset;
        let body_len = match content_length {
            Some(declared) if declared != available => {
                if self.config.check_content_length() {
                    message.mark_invalid(format!("content-length {declared} does not match body size {available}"));
                    available
                } else {
                    warn!(declared, available, "content-length disagrees with the received body");
                    declared.min(available)
                }
            }
            Some(declared) => declared,
            None => available,
        };
        let body = message.arena.range(whole, body_offset, body_offset + body_len);
        message.set_body_range(body);

        trace!(headers = parsed.len(), body_size = body_len, "decoded sip message");
        Ok(message)
    }

    /// Finds the declared Content-Length in a header block that starts with the
    /// start line and ends with the blank line.
    pub(crate) fn scan_content_length(&self, head: &[u8]) -> Result<Option<usize>, ParseError> {
        let line_end = find_subsequence(head, CRLF).ok_or_else(|| ParseError::incomplete("start line is not terminated"))?;

        let mut headers = vec![httparse::EMPTY_HEADER; self.config.max_headers()];
        match httparse::parse_headers(&head[line_end + CRLF.len()..], &mut headers).map_err(|e| self.map_error(e))? {
            Status::Complete((_, parsed)) => parsed
                .iter()
                .find(|header| HeaderType::from_name(header.name) == Some(HeaderType::ContentLength))
                .map(|header| parse_content_length(header.value))
                .transpose(),
            Status::Partial => Err(ParseError::incomplete("header block is not terminated")),
        }
    }

    fn map_error(&self, e: Error) -> ParseError {
        match e {
            Error::TooManyHeaders => ParseError::too_many_headers(self.config.max_headers()),
            e => ParseError::invalid_header(e),
        }
    }
}

impl Decoder for HeaderDecoder {
    type Item = SipMessage;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        src.advance(leading_crlf_len(src));
        if src.is_empty() {
            return Ok(None);
        }
        self.parse_message(src.split().freeze()).map(Some)
    }
}

/// A sipfrag may start right with its headers.
fn is_start_line(line: &[u8]) -> bool {
    !line.contains(&b':') || std::str::from_utf8(line).is_ok_and(|line| StartLine::parse(line).is_ok())
}

fn parse_content_length(value: &[u8]) -> Result<usize, ParseError> {
    let value = std::str::from_utf8(value).map_err(|_| ParseError::invalid_content_length("value is not utf-8"))?;
    value.trim().parse::<usize>().map_err(|_| ParseError::invalid_content_length(format!("value {value} is not usize")))
}

/// Stores the byte range positions of a header's name and value within the original buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

impl HeaderIndex {
    /// Records the byte positions of header names and values, with the
    /// surrounding whitespace of values cut off.
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);

            let value = header.value.trim_ascii();
            let value_start = if value.is_empty() { name_end } else { value.as_ptr() as usize - bytes_ptr };
            indices.value = (value_start, value_start + value.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{h, SipError};
    use indoc::indoc;

    fn crlf(text: &str) -> Bytes {
        Bytes::from(text.replace('\n', "\r\n"))
    }

    fn decoder() -> HeaderDecoder {
        HeaderDecoder::new(ParseConfig::default(), true)
    }

    const REGISTER: &str = indoc! {"
        REGISTER sip:registrar.biloxi.com SIP/2.0
        Via: SIP/2.0/UDP bobspc.biloxi.com:5060;branch=z9hG4bKnashds7
        Max-Forwards: 70
        To: Bob <sip:bob@biloxi.com>
        From: Bob <sip:bob@biloxi.com>;tag=456248
        Call-ID: 843817637684230@998sdasdh09
        CSeq: 1826 REGISTER
        Contact: <sip:bob@192.0.2.4>
        Expires: 7200
        Content-Length: 0

    "};

    #[test]
    fn from_softphone() {
        let mut message = decoder().parse_message(crlf(REGISTER)).unwrap();

        assert!(message.is_request());
        assert!(message.is_external());
        assert!(!message.has_body());
        assert_eq!(message.header_types().len(), 9);
        assert_eq!(message.header::<h::Expires>().unwrap().value(), 7200);
        assert_eq!(message.headers::<h::Contacts>().unwrap()[0].uri().host(), "192.0.2.4");
    }

    #[test]
    fn raw_fields_point_into_the_received_buffer() {
        let message = decoder().parse_message(crlf(REGISTER)).unwrap();
        assert_eq!(message.arena.buffer_count(), 1);
        assert_eq!(message.get_raw_header(HeaderType::CSeq).unwrap(), vec![Bytes::from_static(b"1826 REGISTER")]);
    }

    #[test]
    fn leading_crlf_is_skipped() {
        let mut raw = BytesMut::from(&b"\r\n\r\n"[..]);
        raw.extend_from_slice(&crlf(REGISTER));

        let message = decoder().parse_message(raw.freeze()).unwrap();
        assert!(message.is_request());
    }

    #[test]
    fn values_are_trimmed() {
        let raw = crlf("OPTIONS sip:carol@chicago.com SIP/2.0\nCall-ID:   abc@host   \nX-Empty:\nContent-Length: 0\n\n");
        let mut message = decoder().parse_message(raw).unwrap();

        assert_eq!(message.header::<h::CallId>().unwrap().value(), "abc@host");
        assert_eq!(message.raw_unknown_headers()[0].1, vec![Bytes::new()]);
    }

    #[test]
    fn body_is_cut_by_content_length() {
        let raw = crlf("MESSAGE sip:user2@domain.com SIP/2.0\nContent-Type: text/plain\nContent-Length: 5\n\nhello world");
        let message = decoder().parse_message(raw).unwrap();

        assert!(!message.is_invalid());
        assert_eq!(message.body_bytes().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn strict_content_length_marks_invalid() {
        let raw = crlf("MESSAGE sip:user2@domain.com SIP/2.0\nContent-Length: 50\n\nhello");
        let config = ParseConfig::default().with_check_content_length(true);
        let mut message = HeaderDecoder::new(config, true).parse_message(raw).unwrap();

        assert!(message.is_invalid());
        assert!(message.invalid_reason().unwrap().contains("content-length 50"));
        assert!(matches!(message.transaction_id(), Err(SipError::InvalidMessage { .. })));
    }

    #[test]
    fn body_without_content_length_takes_the_rest() {
        let raw = crlf("MESSAGE sip:user2@domain.com SIP/2.0\nContent-Type: text/plain\n\nhello");
        let message = decoder().parse_message(raw).unwrap();
        assert_eq!(message.body_bytes().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn invalid_content_length() {
        let raw = crlf("MESSAGE sip:user2@domain.com SIP/2.0\nContent-Length: five\n\nhello");
        let error = decoder().parse_message(raw).unwrap_err();
        assert!(matches!(error, ParseError::InvalidContentLength { .. }));
    }

    #[test]
    fn malformed_start_line_keeps_the_message() {
        let raw = crlf("INVITE sip:bob@biloxi.com SIP/3.0\nCall-ID: abc\nContent-Length: 0\n\n");
        let mut message = decoder().parse_message(raw).unwrap();

        assert!(message.is_invalid());
        assert!(message.start_line().is_none());
        assert!(message.exists(HeaderType::CallId));
        assert!(message.encode().is_err());
    }

    #[test]
    fn unterminated_header_block() {
        let raw = crlf("INVITE sip:bob@biloxi.com SIP/2.0\nCall-ID: abc\n");
        assert!(matches!(decoder().parse_message(raw), Err(ParseError::Incomplete { .. })));
        assert!(matches!(decoder().parse_message(Bytes::from_static(b"\r\n")), Err(ParseError::Incomplete { .. })));
    }

    #[test]
    fn limits() {
        let many = ParseConfig::default().with_max_headers(2);
        let error = HeaderDecoder::new(many, true).parse_message(crlf(REGISTER)).unwrap_err();
        assert!(matches!(error, ParseError::TooManyHeaders { max_num: 2 }));

        let small = ParseConfig::default().with_max_header_bytes(64);
        let error = HeaderDecoder::new(small, true).parse_message(crlf(REGISTER)).unwrap_err();
        assert!(matches!(error, ParseError::TooLargeHeader { max_size: 64, .. }));
    }

    #[test]
    fn broken_header_line() {
        let raw = crlf("INVITE sip:bob@biloxi.com SIP/2.0\nCall ID abc\n\n");
        assert!(matches!(decoder().parse_message(raw), Err(ParseError::InvalidHeader { .. })));
    }

    #[test]
    fn fragment_variants() {
        let decoder = decoder();

        let status_only = decoder.parse_fragment(Bytes::from_static(b"SIP/2.0 200 OK")).unwrap();
        assert_eq!(status_only.status_line().unwrap().code(), 200);

        let mut unterminated = decoder.parse_fragment(Bytes::from_static(b"SIP/2.0 100 Trying\r\nCSeq: 1 REFER\r\n")).unwrap();
        assert_eq!(unterminated.header::<h::CSeq>().unwrap().sequence(), 1);
        assert!(!unterminated.has_body());

        let mut headers_only = decoder.parse_fragment(Bytes::from_static(b"Call-ID: abc@host")).unwrap();
        assert!(headers_only.start_line().is_none());
        assert!(!headers_only.is_invalid());
        assert_eq!(headers_only.get_raw_header(HeaderType::CallId).unwrap(), vec![Bytes::from_static(b"abc@host")]);
        assert!(headers_only.header::<h::CallId>().is_err());
    }

    #[test]
    fn datagram_decoder() {
        let mut buffer = BytesMut::from(&b"\r\n\r\n"[..]);
        let mut decoder = decoder();
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(&crlf(REGISTER));
        let message = decoder.decode(&mut buffer).unwrap().unwrap();
        assert!(message.is_request());
        assert!(buffer.is_empty());
    }
}
