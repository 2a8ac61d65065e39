use std::io;
use thiserror::Error;

/// Top-level error returned by the message API.
#[derive(Debug, Error)]
pub enum SipError {
    #[error("parse error: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("header error: {source}")]
    Header {
        #[from]
        source: HeaderParseError,
    },

    #[error("contract violation: {source}")]
    Contract {
        #[from]
        source: ContractError,
    },

    #[error("content error: {source}")]
    Content {
        #[from]
        source: ContentError,
    },

    #[error("encode error: {source}")]
    Encode {
        #[from]
        source: EncodeError,
    },

    #[error("message is invalid: {reason}")]
    InvalidMessage { reason: String },
}

impl SipError {
    pub fn invalid_message<S: ToString>(str: S) -> Self {
        Self::InvalidMessage { reason: str.to_string() }
    }
}

/// Errors raised while framing bytes from the wire into a message.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("body size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("incomplete message: {reason}")]
    Incomplete { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("content-length header is required on stream transports")]
    MissingContentLength,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_large_body(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn incomplete<S: ToString>(str: S) -> Self {
        Self::Incomplete { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// A single header slot failed to promote from raw bytes to its typed form.
///
/// The error is scoped to that header: the rest of the message stays usable
/// and the slot keeps its raw bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("can't parse header {header}: {reason} (raw: {raw:?})")]
pub struct HeaderParseError {
    header: String,
    raw: String,
    reason: String,
}

impl HeaderParseError {
    pub fn new<H: ToString, R: ToString, S: ToString>(header: H, raw: R, reason: S) -> Self {
        Self { header: header.to_string(), raw: raw.to_string(), reason: reason.to_string() }
    }

    /// Name of the header that failed to parse.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// The offending raw text.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Local logic faults: the caller asked for something the message can't have.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("message has no start line yet")]
    NoStartLine,

    #[error("request line requested on a response")]
    NotARequest,

    #[error("status line requested on a request")]
    NotAResponse,

    #[error("header {name} is not present")]
    HeaderMissing { name: String },

    #[error("{name} is a known header, not an extension")]
    KnownHeader { name: String },

    #[error("outbound decorator handle {handle} is not registered")]
    UnknownDecorator { handle: usize },
}

impl ContractError {
    pub fn header_missing<S: ToString>(name: S) -> Self {
        Self::HeaderMissing { name: name.to_string() }
    }

    pub fn known_header<S: ToString>(name: S) -> Self {
        Self::KnownHeader { name: name.to_string() }
    }
}

/// Failures of the content factory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("message has a body but no content-type header")]
    MissingContentType,

    #[error("malformed {content_type} body: {reason}")]
    Malformed { content_type: String, reason: String },
}

impl ContentError {
    pub fn malformed<C: ToString, S: ToString>(content_type: C, reason: S) -> Self {
        Self::Malformed { content_type: content_type.to_string(), reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("refuse to encode invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("message has no start line")]
    MissingStartLine,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl EncodeError {
    pub fn invalid_message<S: ToString>(str: S) -> Self {
        Self::InvalidMessage { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
