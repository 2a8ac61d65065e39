use std::fmt;
use std::str::FromStr;

use crate::grammar::{is_token, GrammarError};

/// SIP request methods. Method names are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Ack,
    Bye,
    Cancel,
    Info,
    Invite,
    Message,
    Notify,
    Options,
    Prack,
    Publish,
    Refer,
    Register,
    Subscribe,
    Update,
    /// Any other syntactically valid method token
    Extension(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Info => "INFO",
            Method::Invite => "INVITE",
            Method::Message => "MESSAGE",
            Method::Notify => "NOTIFY",
            Method::Options => "OPTIONS",
            Method::Prack => "PRACK",
            Method::Publish => "PUBLISH",
            Method::Refer => "REFER",
            Method::Register => "REGISTER",
            Method::Subscribe => "SUBSCRIBE",
            Method::Update => "UPDATE",
            Method::Extension(method) => method,
        }
    }
}

impl FromStr for Method {
    type Err = GrammarError;

    fn from_str(str: &str) -> Result<Self, Self::Err> {
        let method = match str {
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "INFO" => Method::Info,
            "INVITE" => Method::Invite,
            "MESSAGE" => Method::Message,
            "NOTIFY" => Method::Notify,
            "OPTIONS" => Method::Options,
            "PRACK" => Method::Prack,
            "PUBLISH" => Method::Publish,
            "REFER" => Method::Refer,
            "REGISTER" => Method::Register,
            "SUBSCRIBE" => Method::Subscribe,
            "UPDATE" => Method::Update,
            other if is_token(other) => Method::Extension(other.to_string()),
            other => return Err(GrammarError::new(format!("invalid method {other:?}"))),
        };
        Ok(method)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from() {
        assert_eq!("INVITE".parse::<Method>(), Ok(Method::Invite));
        assert_eq!("REGISTER".parse::<Method>(), Ok(Method::Register));
        assert_eq!("PING".parse::<Method>(), Ok(Method::Extension("PING".to_string())));
    }

    #[test]
    fn test_method_is_case_sensitive() {
        assert_eq!("invite".parse::<Method>(), Ok(Method::Extension("invite".to_string())));
        assert_ne!("invite".parse::<Method>(), Ok(Method::Invite));
    }

    #[test]
    fn test_method_from_error() {
        assert!("".parse::<Method>().is_err());
        assert!("IN VITE".parse::<Method>().is_err());
    }
}
