use std::fmt;
use std::str::FromStr;

use mime::Mime;

use crate::grammar::params::Params;
use crate::grammar::scan::is_token;
use crate::grammar::{GrammarError, HeaderValue};

/// `Call-ID: a84b4c76e66710@pc33.atlanta.com`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId {
    value: String,
}

impl CallId {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into() }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl HeaderValue for CallId {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        let value = raw.trim();
        if value.is_empty() || value.chars().any(char::is_whitespace) {
            return Err(GrammarError::new(format!("invalid call-id {raw:?}")));
        }
        Ok(Self::new(value))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// A non-negative integer with an optional `(comment)` and params,
/// e.g. `Retry-After: 18000 (in maintenance);duration=3600`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerCategory {
    value: u32,
    comment: Option<String>,
    params: Params,
}

impl IntegerCategory {
    pub fn new(value: u32) -> Self {
        Self { value, comment: None, params: Params::new() }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn set_value(&mut self, value: u32) {
        self.value = value;
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl HeaderValue for IntegerCategory {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        let raw = raw.trim();
        let digits_end = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
        let value = raw[..digits_end].parse::<u32>().map_err(|_| GrammarError::new(format!("expect integer, found {raw:?}")))?;

        let mut rest = raw[digits_end..].trim_start();
        let mut comment = None;
        if let Some(stripped) = rest.strip_prefix('(') {
            let close = stripped.find(')').ok_or_else(|| GrammarError::new(format!("unterminated comment in {raw:?}")))?;
            comment = Some(stripped[..close].to_string());
            rest = stripped[close + 1..].trim_start();
        }

        if !rest.is_empty() && !rest.starts_with(';') {
            return Err(GrammarError::new(format!("trailing characters after integer in {raw:?}")));
        }
        let params = Params::parse(rest)?;
        Ok(Self { value, comment, params })
    }
}

impl fmt::Display for IntegerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        if let Some(comment) = &self.comment {
            write!(f, " ({comment})")?;
        }
        write!(f, "{}", self.params)
    }
}

/// A token with params: `Event: presence;id=1`, `Supported: timer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    params: Params,
}

impl Token {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into(), params: Params::new() }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}

impl HeaderValue for Token {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        let (value, params) = match raw.split_once(';') {
            Some((value, params)) => (value.trim(), Params::parse(params)?),
            None => (raw.trim(), Params::new()),
        };
        if !is_token(value) {
            return Err(GrammarError::new(format!("invalid token {value:?}")));
        }
        Ok(Self { value: value.to_string(), params })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.params)
    }
}

/// A media type, backed by [`mime::Mime`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeCategory {
    mime: Mime,
}

impl MimeCategory {
    pub fn new(mime: Mime) -> Self {
        Self { mime }
    }

    pub fn mime(&self) -> &Mime {
        &self.mime
    }

    pub fn into_mime(self) -> Mime {
        self.mime
    }
}

impl From<Mime> for MimeCategory {
    fn from(mime: Mime) -> Self {
        Self::new(mime)
    }
}

impl HeaderValue for MimeCategory {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        let mime = Mime::from_str(raw.trim()).map_err(|e| GrammarError::new(format!("invalid media type {raw:?}: {e}")))?;
        Ok(Self { mime })
    }
}

impl fmt::Display for MimeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mime)
    }
}

/// Free-form header text, kept verbatim apart from surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringCategory {
    value: String,
}

impl StringCategory {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self { value: value.into() }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value<S: Into<String>>(&mut self, value: S) {
        self.value = value.into();
    }
}

impl HeaderValue for StringCategory {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        Ok(Self::new(raw.trim()))
    }
}

impl fmt::Display for StringCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
