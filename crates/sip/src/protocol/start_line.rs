use std::fmt;

use crate::grammar::{GrammarError, Uri};
use crate::protocol::Method;

pub const SIP_VERSION: &str = "SIP/2.0";

/// `INVITE sip:bob@biloxi.com SIP/2.0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    method: Method,
    uri: Uri,
    version: String,
}

impl RequestLine {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri, version: SIP_VERSION.to_string() }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn uri_mut(&mut self) -> &mut Uri {
        &mut self.uri
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.method, self.uri, self.version)
    }
}

/// `SIP/2.0 180 Ringing`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    version: String,
    code: u16,
    reason: String,
}

impl StatusLine {
    pub fn new<R: Into<String>>(code: u16, reason: R) -> Self {
        Self { version: SIP_VERSION.to_string(), code, reason: reason.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn set_reason<R: Into<String>>(&mut self, reason: R) {
        self.reason = reason.into();
    }

    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.code)
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.code, self.reason)
    }
}

/// The first line of a message. Exactly one shape is ever present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request(RequestLine),
    Response(StatusLine),
}

impl StartLine {
    /// Parses a start line without its trailing line break.
    pub fn parse(line: &str) -> Result<Self, GrammarError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.starts_with("SIP/") {
            Self::parse_status_line(line)
        } else {
            Self::parse_request_line(line)
        }
    }

    fn parse_request_line(line: &str) -> Result<Self, GrammarError> {
        let mut parts = line.split(' ');
        let (Some(method), Some(uri), Some(version), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(GrammarError::new(format!("malformed request line {line:?}")));
        };
        check_version(version)?;

        let method = method.parse::<Method>()?;
        let uri = uri.parse::<Uri>()?;
        Ok(StartLine::Request(RequestLine { method, uri, version: version.to_string() }))
    }

    fn parse_status_line(line: &str) -> Result<Self, GrammarError> {
        let mut parts = line.splitn(3, ' ');
        let (Some(version), Some(code)) = (parts.next(), parts.next()) else {
            return Err(GrammarError::new(format!("malformed status line {line:?}")));
        };
        check_version(version)?;

        let code = code.parse::<u16>().map_err(|_| GrammarError::new(format!("invalid status code {code:?}")))?;
        if !(100..700).contains(&code) {
            return Err(GrammarError::new(format!("status code {code} out of range")));
        }
        let reason = parts.next().unwrap_or_default();
        Ok(StartLine::Response(StatusLine { version: version.to_string(), code, reason: reason.to_string() }))
    }

    pub fn is_request(&self) -> bool {
        matches!(self, StartLine::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, StartLine::Response(_))
    }
}

fn check_version(version: &str) -> Result<(), GrammarError> {
    if version.eq_ignore_ascii_case(SIP_VERSION) {
        Ok(())
    } else {
        Err(GrammarError::new(format!("unsupported version {version:?}")))
    }
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request(line) => write!(f, "{line}"),
            StartLine::Response(line) => write!(f, "{line}"),
        }
    }
}
