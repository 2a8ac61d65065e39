use std::fmt;

use crate::grammar::scan::find_unquoted;
use crate::grammar::GrammarError;

/// One `;name[=value]` parameter. Names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    name: String,
    value: Option<String>,
}

impl Param {
    pub fn new<N: Into<String>>(name: N, value: Option<String>) -> Self {
        Self { name: name.into(), value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, ";{}={}", self.name, value),
            None => write!(f, ";{}", self.name),
        }
    }
}

/// An ordered parameter list, encoded as `;a=1;b`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    params: Vec<Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `;a=1;b` (the leading `;` is optional). Quoted values keep their quotes.
    pub fn parse(raw: &str) -> Result<Self, GrammarError> {
        let mut params = Vec::new();
        let mut rest = raw.trim();
        if let Some(stripped) = rest.strip_prefix(';') {
            rest = stripped;
        }

        while !rest.is_empty() {
            let (item, tail) = match find_unquoted(rest, ';') {
                Some(index) => (&rest[..index], &rest[index + 1..]),
                None => (rest, ""),
            };
            rest = tail;

            let item = item.trim();
            if item.is_empty() {
                return Err(GrammarError::new("empty parameter"));
            }
            let param = match item.split_once('=') {
                Some((name, value)) => Param::new(name.trim(), Some(value.trim().to_string())),
                None => Param::new(item, None),
            };
            if param.name.is_empty() {
                return Err(GrammarError::new(format!("parameter without name: {item}")));
            }
            params.push(param);
        }

        Ok(Self { params })
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|param| param.name.eq_ignore_ascii_case(name))
    }

    /// Value of `name`; `None` when absent or value-less.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Param::value)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name`, replacing an existing parameter in place.
    pub fn set<N: Into<String>>(&mut self, name: N, value: Option<String>) {
        let name = name.into();
        let existing = self.params.iter().position(|param| param.name.eq_ignore_ascii_case(&name));
        match existing {
            Some(index) => self.params[index].value = value,
            None => self.params.push(Param::new(name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.params.retain(|param| !param.name.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Order-independent rendering used for hashing: lowercased names, sorted.
    pub(crate) fn canonical(&self) -> String {
        let mut rendered: Vec<String> = self
            .params
            .iter()
            .map(|param| match &param.value {
                Some(value) => format!("{}={}", param.name.to_ascii_lowercase(), value),
                None => param.name.to_ascii_lowercase(),
            })
            .collect();
        rendered.sort();
        rendered.join(";")
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in &self.params {
            write!(f, "{param}")?;
        }
        Ok(())
    }
}
