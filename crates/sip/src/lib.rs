//! A lazily parsed SIP message
//!
//! This crate provides the message model of a SIP stack: the one structure
//! that transports, transaction layers, dialog managers and applications all
//! read, mutate and write back onto the wire. Parsing is deferred: ingesting a
//! datagram only splits it into a start line, raw header fields and a body, and
//! each header is parsed into its typed form the first time something asks
//! for it.
//!
//! # Features
//!
//! - Lazy, per-header parsing with typed access through [`protocol::h`] tokens
//! - Byte-exact pass-through of headers nobody looked at
//! - Compact header forms (`v`, `i`, `f`, ...) and extension headers
//! - Transaction id derivation for RFC 3261 and RFC 2543 peers
//! - Typed bodies built on demand from the Content-Type
//! - Outbound decorators run right before a message is sent
//! - tokio-util codecs for stream transports
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use micro_sip::protocol::{h, Method, SipMessage};
//!
//! let wire = "INVITE sip:bob@biloxi.com SIP/2.0\r\n\
//!             Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n\
//!             To: Bob <sip:bob@biloxi.com>\r\n\
//!             From: Alice <sip:alice@atlanta.com>;tag=1928301774\r\n\
//!             Call-ID: a84b4c76e66710@pc33.atlanta.com\r\n\
//!             CSeq: 314159 INVITE\r\n\
//!             Content-Length: 0\r\n\r\n";
//!
//! let mut message = SipMessage::parse(Bytes::from_static(wire.as_bytes()), true).unwrap();
//! assert_eq!(message.method().unwrap(), Method::Invite);
//! assert_eq!(message.header::<h::From>().unwrap().tag(), Some("1928301774"));
//! assert_eq!(message.transaction_id().unwrap().as_str(), "z9hG4bK776asdhds");
//!
//! // untouched headers are written back byte for byte
//! let encoded = message.encode().unwrap();
//! assert!(encoded.starts_with(b"INVITE sip:bob@biloxi.com SIP/2.0\r\n"));
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`protocol`]: the message model, header storage, errors and transaction identity
//! - [`grammar`]: typed header values and their parsers
//! - [`codec`]: message decoding and encoding
//! - [`config`]: parse limits and the strict Content-Length toggle
//!
//! # Error Handling
//!
//! - [`protocol::ParseError`]: the bytes are not a SIP message
//! - [`protocol::HeaderParseError`]: one header value failed its grammar
//! - [`protocol::ContractError`]: the caller asked for something the message can't give
//! - [`protocol::EncodeError`]: the message can't be put on the wire
//! - [`protocol::SipError`]: any of the above
//!
//! # Limitations
//!
//! - No transport, transaction or dialog logic, only the message they exchange
//! - Body types beyond plain text, sipfrag and opaque octets are left to
//!   a user supplied [`protocol::ContentFactory`]

pub mod codec;
pub mod config;
pub mod grammar;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
