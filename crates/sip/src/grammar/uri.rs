use std::fmt;
use std::str::FromStr;

use crate::grammar::params::Params;
use crate::grammar::{GrammarError, HeaderValue};

/// A SIP, SIPS or other absolute URI.
///
/// `sip:user:password@host:port;params?headers`. Non-SIP schemes such as
/// `tel:` go through the same split; without an `@` everything up to the
/// first `;` is the host part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    scheme: String,
    user: Option<String>,
    password: Option<String>,
    host: String,
    port: Option<u16>,
    params: Params,
    headers: Vec<(String, String)>,
}

impl Uri {
    pub fn new<S: Into<String>, H: Into<String>>(scheme: S, host: H) -> Self {
        Self {
            scheme: scheme.into(),
            user: None,
            password: None,
            host: host.into(),
            port: None,
            params: Params::new(),
            headers: Vec::new(),
        }
    }

    /// Shorthand for a `sip:` URI.
    pub fn sip<H: Into<String>>(host: H) -> Self {
        Self::new("sip", host)
    }

    pub fn with_user<U: Into<String>>(mut self, user: U) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_host<H: Into<String>>(&mut self, host: H) {
        self.host = host.into();
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn set_port(&mut self, port: Option<u16>) {
        self.port = port;
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Embedded headers (`?name=value&...`), still percent-encoded.
    pub fn embedded_headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn add_embedded_header<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.headers.push((name.into(), value.into()));
    }

    /// Rendering used for hashing: scheme and host lowercased, params sorted,
    /// embedded headers left out.
    pub(crate) fn canonical(&self) -> String {
        format!(
            "{}:{}:{}@{}:{}:{}",
            self.scheme.to_ascii_lowercase(),
            self.user.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
            self.host.to_ascii_lowercase(),
            self.port.map(|port| port.to_string()).unwrap_or_default(),
            self.params.canonical()
        )
    }

    /// The URI without params or embedded headers, as used in identity strings.
    pub(crate) fn address_of_record(&self) -> String {
        let mut aor = format!("{}:", self.scheme);
        if let Some(user) = &self.user {
            aor.push_str(user);
            aor.push('@');
        }
        aor.push_str(&self.host);
        if let Some(port) = self.port {
            aor.push_str(&format!(":{port}"));
        }
        aor
    }
}

impl FromStr for Uri {
    type Err = GrammarError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (scheme, rest) = raw.split_once(':').ok_or_else(|| GrammarError::new(format!("uri without scheme: {raw}")))?;
        if scheme.is_empty() || !scheme.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(GrammarError::new(format!("invalid uri scheme: {scheme}")));
        }
        if rest.chars().any(char::is_whitespace) {
            return Err(GrammarError::new(format!("whitespace in uri: {raw}")));
        }

        let (rest, headers) = match rest.split_once('?') {
            Some((rest, headers)) => (rest, parse_embedded_headers(headers)?),
            None => (rest, Vec::new()),
        };

        let (userinfo, host_part) = match rest.rfind('@') {
            Some(index) => (Some(&rest[..index]), &rest[index + 1..]),
            None => (None, rest),
        };

        let (hostport, params) = match host_part.split_once(';') {
            Some((hostport, params)) => (hostport, Params::parse(params)?),
            None => (host_part, Params::new()),
        };

        let (user, password) = match userinfo {
            Some(userinfo) => match userinfo.split_once(':') {
                Some((user, password)) => (Some(user.to_string()), Some(password.to_string())),
                None => (Some(userinfo.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = split_host_port(hostport)?;
        if host.is_empty() {
            return Err(GrammarError::new(format!("uri without host: {raw}")));
        }

        Ok(Self { scheme: scheme.to_string(), user, password, host: host.to_string(), port, params, headers })
    }
}

impl HeaderValue for Uri {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        raw.parse()
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme)?;
        if let Some(user) = &self.user {
            write!(f, "{user}")?;
            if let Some(password) = &self.password {
                write!(f, ":{password}")?;
            }
            write!(f, "@")?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.params)?;
        for (index, (name, value)) in self.headers.iter().enumerate() {
            let separator = if index == 0 { '?' } else { '&' };
            write!(f, "{separator}{name}={value}")?;
        }
        Ok(())
    }
}

/// Splits `host[:port]`, keeping IPv6 references bracketed.
pub(crate) fn split_host_port(hostport: &str) -> Result<(&str, Option<u16>), GrammarError> {
    let hostport = hostport.trim();
    let (host, port) = if hostport.starts_with('[') {
        let end = hostport.find(']').ok_or_else(|| GrammarError::new(format!("unterminated ipv6 reference: {hostport}")))?;
        let tail = &hostport[end + 1..];
        match tail.strip_prefix(':') {
            Some(port) => (&hostport[..=end], Some(port)),
            None if tail.is_empty() => (&hostport[..=end], None),
            None => return Err(GrammarError::new(format!("garbage after ipv6 reference: {hostport}"))),
        }
    } else {
        match hostport.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (hostport, None),
        }
    };

    let port = match port {
        Some(port) => Some(port.trim().parse::<u16>().map_err(|_| GrammarError::new(format!("invalid port: {port}")))?),
        None => None,
    };
    Ok((host.trim(), port))
}

fn parse_embedded_headers(raw: &str) -> Result<Vec<(String, String)>, GrammarError> {
    raw.split('&')
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.split_once('=')
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .ok_or_else(|| GrammarError::new(format!("embedded header without value: {item}")))
        })
        .collect()
}

/// Decodes `%XX` escapes; invalid escapes are kept verbatim.
pub(crate) fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[index + 1]), hex_value(bytes[index + 2])) {
                decoded.push(high << 4 | low);
                index += 3;
                continue;
            }
        }
        decoded.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
