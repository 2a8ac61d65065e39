//! SIP codec module for turning bytes into messages and back
//!
//! # Architecture
//!
//! - Datagram transports:
//!   - [`HeaderDecoder`]: one buffer is one message
//!
//! - Stream transports:
//!   - [`MessageDecoder`]: frames messages by Content-Length, skipping CRLF keep-alives
//!   - [`MessageEncoder`]: writes the full encoding of each message
//!
//! - Encodings shared with the message API:
//!   - [`encode_message`], [`encode_sip_frag`], [`encode_brief`]
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_sip::codec::MessageDecoder;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = MessageDecoder::new();
//! let mut buffer = BytesMut::from(&b"OPTIONS sip:carol@chicago.com SIP/2.0\r\nContent-Length: 0\r\n\r\n"[..]);
//! let message = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert!(message.is_request());
//! ```

mod header;
mod message_decoder;
mod message_encoder;

pub use header::encode_brief;
pub use header::encode_message;
pub use header::encode_sip_frag;
pub use header::HeaderDecoder;
pub use message_decoder::MessageDecoder;
pub use message_encoder::MessageEncoder;
