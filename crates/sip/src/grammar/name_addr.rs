use std::fmt;

use crate::grammar::params::Params;
use crate::grammar::scan::find_unquoted;
use crate::grammar::uri::Uri;
use crate::grammar::{GrammarError, HeaderValue};

/// `"Display Name" <uri>;params` or `uri;params`, plus the `*` Contact.
///
/// Without angle brackets, everything after the first `;` belongs to the
/// header, not the URI (RFC 3261 section 20.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAddr {
    display_name: Option<String>,
    quoted_display_name: bool,
    uri: Uri,
    angle_quoted: bool,
    all_contacts: bool,
    params: Params,
}

impl NameAddr {
    pub fn new(uri: Uri) -> Self {
        Self {
            display_name: None,
            quoted_display_name: true,
            uri,
            angle_quoted: true,
            all_contacts: false,
            params: Params::new(),
        }
    }

    /// The `Contact: *` wildcard used to remove all bindings.
    pub fn all_contacts() -> Self {
        Self {
            display_name: None,
            quoted_display_name: true,
            uri: Uri::new("sip", "*"),
            angle_quoted: false,
            all_contacts: true,
            params: Params::new(),
        }
    }

    pub fn with_display_name<S: Into<String>>(mut self, display_name: S) -> Self {
        self.display_name = Some(display_name.into());
        self.quoted_display_name = true;
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.params.set("tag", Some(tag.into()));
        self
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn uri_mut(&mut self) -> &mut Uri {
        &mut self.uri
    }

    pub fn is_all_contacts(&self) -> bool {
        self.all_contacts
    }

    pub fn tag(&self) -> Option<&str> {
        self.params.value("tag")
    }

    pub fn set_tag<S: Into<String>>(&mut self, tag: S) {
        self.params.set("tag", Some(tag.into()));
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }
}

impl HeaderValue for NameAddr {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        let raw = raw.trim();
        if raw == "*" {
            return Ok(Self::all_contacts());
        }

        match find_unquoted(raw, '<') {
            Some(open) => {
                let close = raw[open..]
                    .find('>')
                    .map(|index| open + index)
                    .ok_or_else(|| GrammarError::new(format!("unterminated '<' in {raw}")))?;
                let (display_name, quoted_display_name) = parse_display_name(&raw[..open])?;
                let uri = raw[open + 1..close].parse()?;
                let params = Params::parse(&raw[close + 1..])?;
                Ok(Self { display_name, quoted_display_name, uri, angle_quoted: true, all_contacts: false, params })
            }
            None => {
                let (uri, params) = match raw.split_once(';') {
                    Some((uri, params)) => (uri, Params::parse(params)?),
                    None => (raw, Params::new()),
                };
                if uri.contains('?') {
                    return Err(GrammarError::new(format!("uri headers require angle brackets: {raw}")));
                }
                Ok(Self {
                    display_name: None,
                    quoted_display_name: true,
                    uri: uri.parse()?,
                    angle_quoted: false,
                    all_contacts: false,
                    params,
                })
            }
        }
    }
}

/// Returns the display name and whether it was a quoted-string.
fn parse_display_name(raw: &str) -> Result<(Option<String>, bool), GrammarError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok((None, true));
    }
    match raw.strip_prefix('"') {
        Some(quoted) => {
            let inner = quoted
                .strip_suffix('"')
                .ok_or_else(|| GrammarError::new(format!("unterminated display name: {raw}")))?;
            Ok((Some(unescape_quoted(inner)), true))
        }
        None => Ok((Some(raw.to_string()), false)),
    }
}

fn unescape_quoted(raw: &str) -> String {
    let mut unescaped = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                unescaped.push(next);
            }
        } else {
            unescaped.push(ch);
        }
    }
    unescaped
}

impl fmt::Display for NameAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.all_contacts {
            return write!(f, "*");
        }
        let uri_needs_angles = !self.uri.params().is_empty() || !self.uri.embedded_headers().is_empty();
        if self.display_name.is_some() || self.angle_quoted || uri_needs_angles {
            match &self.display_name {
                Some(display_name) if self.quoted_display_name => {
                    let escaped = display_name.replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "\"{escaped}\" ")?;
                }
                Some(display_name) => write!(f, "{display_name} ")?,
                None => {}
            }
            write!(f, "<{}>", self.uri)?;
        } else {
            write!(f, "{}", self.uri)?;
        }
        write!(f, "{}", self.params)
    }
}
