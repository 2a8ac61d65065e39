//! SIP message encoder
//!
//! Three encodings of the same message state:
//!
//! - [`encode_message`]: the wire form. Refuses invalid messages and messages
//!   without a start line.
//! - [`encode_sip_frag`]: the form embedded in `message/sipfrag` bodies. The
//!   start line is optional and Content-Length is only written with a body.
//! - [`encode_brief`]: a one-line summary for logs, not wire valid.
//!
//! # Header order
//!
//! Known headers go first, in [`HeaderType`] declaration order, then extension
//! headers in insertion order, then the computed Content-Length. A slot that
//! was never promoted is copied through byte for byte, with the header name as
//! received; a promoted slot is written from its typed values.

use std::io::Write;

use bytes::{BufMut, BytesMut};
use tracing::error;

use crate::grammar::{CSeq, Via};
use crate::protocol::{EncodeError, HeaderType, SipMessage, StartLine};
use crate::utils::FastWrite;

/// Initial buffer size allocated for the start line and headers
const INIT_HEADER_SIZE: usize = 1024;

/// Writes the full wire encoding of `message`.
pub fn encode_message(message: &SipMessage, dst: &mut BytesMut) -> Result<(), EncodeError> {
    if let Some(reason) = message.invalid_reason() {
        error!(reason, "refuse to encode invalid message");
        return Err(EncodeError::invalid_message(reason));
    }
    let Some(start_line) = message.start_line() else {
        error!("refuse to encode message without start line");
        return Err(EncodeError::MissingStartLine);
    };

    let body = message.body_bytes()?;
    dst.reserve(INIT_HEADER_SIZE + body.len());

    write!(FastWrite(dst), "{start_line}\r\n")?;
    encode_headers(message, dst)?;
    write!(FastWrite(dst), "{}: {}\r\n\r\n", HeaderType::ContentLength.name(), body.len())?;
    dst.put_slice(&body);
    Ok(())
}

/// Writes `message` as a `message/sipfrag` body.
pub fn encode_sip_frag(message: &SipMessage, dst: &mut BytesMut) -> Result<(), EncodeError> {
    if let Some(start_line) = message.start_line() {
        write!(FastWrite(dst), "{start_line}\r\n")?;
    }
    encode_headers(message, dst)?;

    if message.has_body() {
        let body = message.body_bytes()?;
        write!(FastWrite(dst), "{}: {}\r\n\r\n", HeaderType::ContentLength.name(), body.len())?;
        dst.put_slice(&body);
    }
    Ok(())
}

fn encode_headers(message: &SipMessage, dst: &mut BytesMut) -> Result<(), EncodeError> {
    for (header_type, slot) in message.headers.known() {
        if header_type == HeaderType::ContentLength {
            continue;
        }
        slot.encode(&message.arena, header_type.name(), dst)?;
    }
    for header in message.headers.unknown() {
        header.slot().encode(&message.arena, header.name(), dst)?;
    }
    Ok(())
}

/// One line describing `message`: kind, method or status, transaction id
/// and CSeq. Never parses anything into the message.
pub fn encode_brief(message: &SipMessage) -> String {
    let mut brief = match message.start_line() {
        Some(StartLine::Request(line)) => format!("SipReq: {} {}", line.method(), line.uri()),
        Some(StartLine::Response(line)) => format!("SipResp: {} {}", line.code(), line.reason()),
        None => "SipMessage: <no start line>".to_string(),
    };

    let tid = match &message.transaction_id {
        Some(id) => Some(id.to_string()),
        None => message.peek::<Via>(HeaderType::Via).and_then(|via| via.branch().map(ToString::to_string)),
    };
    brief.push_str(&format!(" tid={}", tid.as_deref().unwrap_or("?")));

    if let Some(cseq) = message.peek::<CSeq>(HeaderType::CSeq) {
        brief.push_str(&format!(" cseq={cseq}"));
    }
    brief.push_str(if message.is_external() { " from(wire)" } else { " from(tu)" });
    if message.is_invalid() {
        brief.push_str(" invalid");
    }
    brief
}
