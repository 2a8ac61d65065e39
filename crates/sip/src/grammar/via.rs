use std::fmt;

use crate::grammar::params::Params;
use crate::grammar::uri::split_host_port;
use crate::grammar::{GrammarError, HeaderValue};

/// RFC 3261 magic cookie that marks a branch as globally unique.
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// One `Via` value: `SIP/2.0/UDP pc33.atlanta.com:5060;branch=z9hG4bK776`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Via {
    protocol_name: String,
    protocol_version: String,
    transport: String,
    sent_host: String,
    sent_port: Option<u16>,
    params: Params,
}

impl Via {
    pub fn new<T: Into<String>, H: Into<String>>(transport: T, sent_host: H, sent_port: Option<u16>) -> Self {
        Self {
            protocol_name: "SIP".to_string(),
            protocol_version: "2.0".to_string(),
            transport: transport.into(),
            sent_host: sent_host.into(),
            sent_port,
            params: Params::new(),
        }
    }

    pub fn with_branch<B: Into<String>>(mut self, branch: B) -> Self {
        self.params.set("branch", Some(branch.into()));
        self
    }

    pub fn protocol_name(&self) -> &str {
        &self.protocol_name
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn sent_host(&self) -> &str {
        &self.sent_host
    }

    pub fn set_sent_host<H: Into<String>>(&mut self, host: H) {
        self.sent_host = host.into();
    }

    pub fn sent_port(&self) -> Option<u16> {
        self.sent_port
    }

    pub fn set_sent_port(&mut self, port: Option<u16>) {
        self.sent_port = port;
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.value("branch")
    }

    /// True when the branch carries the RFC 3261 magic cookie.
    pub fn has_rfc3261_branch(&self) -> bool {
        self.branch().is_some_and(|branch| branch.starts_with(BRANCH_MAGIC_COOKIE) && branch.len() > BRANCH_MAGIC_COOKIE.len())
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}

impl HeaderValue for Via {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        let raw = raw.trim();
        let mut protocol = raw.splitn(3, '/');
        let protocol_name = protocol.next().map(str::trim).unwrap_or_default();
        let protocol_version = protocol.next().map(str::trim).unwrap_or_default();
        let rest = protocol
            .next()
            .map(str::trim_start)
            .ok_or_else(|| GrammarError::new(format!("incomplete sent-protocol: {raw}")))?;

        let transport_end = rest
            .find(char::is_whitespace)
            .ok_or_else(|| GrammarError::new(format!("via without sent-by: {raw}")))?;
        let transport = &rest[..transport_end];
        let rest = rest[transport_end..].trim_start();

        if protocol_name.is_empty() || protocol_version.is_empty() || transport.is_empty() {
            return Err(GrammarError::new(format!("incomplete sent-protocol: {raw}")));
        }

        let (sent_by, params) = match rest.split_once(';') {
            Some((sent_by, params)) => (sent_by, Params::parse(params)?),
            None => (rest, Params::new()),
        };
        let (sent_host, sent_port) = split_host_port(sent_by)?;
        if sent_host.is_empty() {
            return Err(GrammarError::new(format!("via without sent-by host: {raw}")));
        }

        Ok(Self {
            protocol_name: protocol_name.to_string(),
            protocol_version: protocol_version.to_string(),
            transport: transport.to_string(),
            sent_host: sent_host.to_string(),
            sent_port,
            params,
        })
    }
}

impl fmt::Display for Via {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{} {}", self.protocol_name, self.protocol_version, self.transport, self.sent_host)?;
        if let Some(port) = self.sent_port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.params)
    }
}
