use std::fmt;

use crate::grammar::{GrammarError, HeaderValue};
use crate::protocol::Method;

/// `CSeq: 4711 INVITE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSeq {
    sequence: u32,
    method: Method,
}

impl CSeq {
    pub fn new(sequence: u32, method: Method) -> Self {
        Self { sequence, method }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }
}

impl HeaderValue for CSeq {
    fn parse_value(raw: &str) -> Result<Self, GrammarError> {
        let mut parts = raw.split_whitespace();
        let (Some(sequence), Some(method), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(GrammarError::new(format!("expect '<sequence> <method>', found {raw:?}")));
        };

        let sequence = sequence.parse::<u32>().map_err(|_| GrammarError::new(format!("sequence {sequence} is not u32")))?;
        let method = method.parse::<Method>()?;
        Ok(Self { sequence, method })
    }
}

impl fmt::Display for CSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.sequence, self.method)
    }
}
