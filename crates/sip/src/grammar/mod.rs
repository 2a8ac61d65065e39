//! Typed header values and the grammar that produces them.
//!
//! The message never parses a header eagerly. When a slot is promoted, every
//! raw value in it goes through [`HeaderValue::parse_value`] of the value type
//! bound to that header (see [`crate::protocol::h`]). Parsing is pure: the
//! same input always produces the same value and nothing outside the returned
//! value is touched.
//!
//! # Value types
//!
//! - [`Via`]: `SIP/2.0/UDP host:port;branch=...`
//! - [`NameAddr`]: From, To, Contact, Route and friends
//! - [`CSeq`]: sequence number plus method
//! - [`CallId`]: opaque call identifier
//! - [`IntegerCategory`]: Content-Length, Max-Forwards, Expires...
//! - [`Token`]: Allow, Supported, Event...
//! - [`MimeCategory`]: Content-Type and Accept, backed by [`mime::Mime`]
//! - [`StringCategory`]: free-form text, also used for extension headers
//!
//! Every value type implements `Display`, which is the canonical encoding used
//! once a slot has been promoted.

use std::fmt;

use thiserror::Error;

mod cseq;
mod name_addr;
mod params;
mod scan;
mod simple;
mod uri;
mod via;

pub use cseq::CSeq;
pub use name_addr::NameAddr;
pub use params::{Param, Params};
pub use simple::{CallId, IntegerCategory, MimeCategory, StringCategory, Token};
pub use uri::Uri;
pub use via::{Via, BRANCH_MAGIC_COOKIE};

pub(crate) use scan::{is_token, split_comma_list};
pub(crate) use uri::percent_decode;

/// A raw header value didn't match the grammar of its header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct GrammarError {
    reason: String,
}

impl GrammarError {
    pub fn new<S: ToString>(reason: S) -> Self {
        Self { reason: reason.to_string() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// A typed header value that can be parsed from one raw header value.
pub trait HeaderValue: Clone + fmt::Debug + fmt::Display + Send + 'static {
    /// Parses a single, already comma-split, header value.
    fn parse_value(raw: &str) -> Result<Self, GrammarError>;
}
