//! The SIP message model.
//!
//! This module holds the in-memory representation every other stack component
//! reads, mutates and finally writes back onto the wire.
//!
//! # Architecture
//!
//! - **Message** ([`SipMessage`]): the aggregate root, owning the start line,
//!   the header slots, the body and the routing metadata
//!
//! - **Header storage** ([`raw`], [`slot`]): raw values are ranges into
//!   buffers owned by the message; each header slot is either
//!   [`HeaderSlot::Raw`] or [`HeaderSlot::Parsed`]
//!   - [`HeaderType`] and the access tokens in [`h`] name the known headers
//!   - [`ParserContainer`] holds the typed values of a promoted slot
//!
//! - **Start line** ([`StartLine`]): [`RequestLine`] or [`StatusLine`]
//!
//! - **Transaction identity** ([`TransactionId`]): branch or legacy hash
//!
//! - **Contents** ([`Contents`]): typed bodies built on demand by a [`ContentFactory`]
//!
//! - **Decoration** ([`OutboundDecorator`]): mutators run right before sending
//!
//! - **Error Handling**: [`SipError`] wraps the narrower
//!   [`ParseError`], [`HeaderParseError`], [`ContractError`], [`ContentError`]
//!   and [`EncodeError`]
//!
//! # Ownership
//!
//! A message has a single owner at a time and is moved between stages rather
//! than shared. Typed accessors take `&mut self` because the first access
//! parses the slot in place. To hand the same message to several consumers,
//! clone it: a clone shares no storage with its source.

mod contents;
pub use contents::ContentFactory;
pub use contents::Contents;
pub use contents::DefaultContentFactory;
pub use contents::OctetContents;
pub use contents::PlainContents;
pub use contents::SipFragContents;

mod decorator;
pub use decorator::DecoratorHandle;
pub use decorator::DecoratorRegistry;
pub use decorator::OutboundDecorator;

mod error;
pub use error::ContentError;
pub use error::ContractError;
pub use error::EncodeError;
pub use error::HeaderParseError;
pub use error::ParseError;
pub use error::SipError;

mod header_type;
pub use header_type::h;
pub use header_type::HeaderToken;
pub use header_type::HeaderType;
pub use header_type::MultiHeader;
pub use header_type::SingleHeader;

mod message;
pub use message::SipMessage;

mod method;
pub use method::Method;

pub mod raw;
pub use raw::BufferArena;
pub use raw::RawField;
pub use raw::RawRange;

mod security;
pub use security::IdentityStrength;
pub use security::SecurityAttributes;
pub use security::SignatureStatus;

pub mod slot;
pub use slot::HeaderSlot;
pub use slot::ParserContainer;

mod start_line;
pub use start_line::RequestLine;
pub use start_line::StartLine;
pub use start_line::StatusLine;
pub use start_line::SIP_VERSION;

mod transaction;
pub use transaction::TransactionId;
pub use transaction::TransactionMessage;

mod tuple;
pub use tuple::TransportType;
pub use tuple::Tuple;
