//! Conversion between one complete SIP message and its bytes
//!
//! # Components
//!
//! - [`HeaderDecoder`]: decodes a complete buffer into a [`SipMessage`](crate::protocol::SipMessage)
//!   - Splits the start line and the header block
//!   - Records raw header ranges without parsing values
//!   - Enforces the configured header limits
//!   - Cuts the body by Content-Length
//!
//! - [`encode_message`], [`encode_sip_frag`], [`encode_brief`]: the three encodings
//!   of a message

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::encode_brief;
pub use header_encoder::encode_message;
pub use header_encoder::encode_sip_frag;
