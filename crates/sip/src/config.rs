//! Parsing limits and the process-wide strict Content-Length toggle.
//!
//! A [`ParseConfig`] value controls how wire bytes are turned into a
//! [`SipMessage`](crate::protocol::SipMessage). Every parse entry point has a
//! `*_with` variant taking an explicit config; the plain variants read the
//! global config, which lives behind an [`ArcSwap`] so it can be replaced at
//! runtime without locking readers.

use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;

/// Default maximum number of header fields in one message
pub const DEFAULT_MAX_HEADERS: usize = 256;

/// Default maximum size in bytes of the start line plus the header section
pub const DEFAULT_MAX_HEADER_BYTES: usize = 64 * 1024;

/// Default maximum Content-Length accepted on a stream transport
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

static GLOBAL_CONFIG: Lazy<ArcSwap<ParseConfig>> = Lazy::new(|| ArcSwap::from_pointee(ParseConfig::default()));

/// Limits and checks applied while ingesting a message from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    max_headers: usize,
    max_header_bytes: usize,
    max_body_bytes: usize,
    check_content_length: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_headers: DEFAULT_MAX_HEADERS,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            check_content_length: false,
        }
    }
}

impl ParseConfig {
    /// Creates a config with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the process-wide config.
    pub fn global() -> ParseConfig {
        **GLOBAL_CONFIG.load()
    }

    /// Replaces the process-wide config.
    pub fn set_global(config: ParseConfig) {
        GLOBAL_CONFIG.store(Arc::new(config));
    }

    pub fn with_max_headers(mut self, max_headers: usize) -> Self {
        self.max_headers = max_headers;
        self
    }

    pub fn with_max_header_bytes(mut self, max_header_bytes: usize) -> Self {
        self.max_header_bytes = max_header_bytes;
        self
    }

    /// Upper bound for a declared Content-Length. The stream decoder never
    /// buffers more than this for one body.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// When enabled, a declared Content-Length that disagrees with the received
    /// body length marks the message invalid instead of truncating the body.
    pub fn with_check_content_length(mut self, check: bool) -> Self {
        self.check_content_length = check;
        self
    }

    pub fn max_headers(&self) -> usize {
        self.max_headers
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn check_content_length(&self) -> bool {
        self.check_content_length
    }
}

/// Flips the process-wide strict Content-Length check.
pub fn set_check_content_length(check: bool) {
    GLOBAL_CONFIG.rcu(|current| {
        let mut next = **current;
        next.check_content_length = check;
        next
    });
}

/// Returns whether the process-wide strict Content-Length check is enabled.
pub fn check_content_length() -> bool {
    GLOBAL_CONFIG.load().check_content_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SipMessage;
    use bytes::Bytes;

    #[test]
    fn builder_overrides_defaults() {
        let config = ParseConfig::new()
            .with_max_headers(8)
            .with_max_header_bytes(1024)
            .with_max_body_bytes(2048)
            .with_check_content_length(true);

        assert_eq!(config.max_headers(), 8);
        assert_eq!(config.max_header_bytes(), 1024);
        assert_eq!(config.max_body_bytes(), 2048);
        assert!(config.check_content_length());

        let default = ParseConfig::default();
        assert_eq!(default.max_headers(), DEFAULT_MAX_HEADERS);
        assert_eq!(default.max_header_bytes(), DEFAULT_MAX_HEADER_BYTES);
        assert_eq!(default.max_body_bytes(), DEFAULT_MAX_BODY_BYTES);
        assert!(!default.check_content_length());
    }

    #[test]
    fn global_strict_content_length_toggle() {
        let raw = Bytes::from_static(b"MESSAGE sip:user2@domain.com SIP/2.0\r\nContent-Length: 50\r\n\r\nhello");
        let previous = ParseConfig::global();

        set_check_content_length(true);
        assert!(check_content_length());
        assert!(ParseConfig::global().check_content_length());
        let strict = SipMessage::parse(raw.clone(), true).unwrap();

        ParseConfig::set_global(previous.with_check_content_length(false));
        assert!(!check_content_length());
        let lenient = SipMessage::parse(raw, true).unwrap();

        ParseConfig::set_global(previous);

        assert!(strict.is_invalid());
        assert!(strict.invalid_reason().unwrap().contains("content-length"));
        assert!(!lenient.is_invalid());
        assert_eq!(lenient.body_bytes().unwrap(), Bytes::from_static(b"hello"));
    }
}
