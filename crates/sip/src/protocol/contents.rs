//! Typed message bodies.
//!
//! The raw body is only turned into a [`Contents`] object when someone asks
//! for it. The conversion goes through a [`ContentFactory`], keyed by the
//! declared `Content-Type`; [`DefaultContentFactory`] knows text bodies, SDP
//! and `message/sipfrag`, and keeps everything else as opaque octets.

use std::any::Any;
use std::fmt::Debug;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use mime::Mime;

use crate::codec::encode_sip_frag;
use crate::protocol::{ContentError, SipMessage};

/// A parsed message body.
pub trait Contents: Any + Debug + Send {
    fn content_type(&self) -> &Mime;

    /// Writes the body bytes.
    fn encode(&self, dst: &mut BytesMut) -> io::Result<()>;

    fn clone_box(&self) -> Box<dyn Contents>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Clone for Box<dyn Contents> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Builds typed contents from a declared media type and the raw body.
pub trait ContentFactory {
    fn create_content(&self, content_type: &Mime, body: Bytes) -> Result<Box<dyn Contents>, ContentError>;
}

/// `text/*` and `application/sdp` become [`PlainContents`], `message/sipfrag`
/// becomes [`SipFragContents`], anything else [`OctetContents`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContentFactory;

impl ContentFactory for DefaultContentFactory {
    fn create_content(&self, content_type: &Mime, body: Bytes) -> Result<Box<dyn Contents>, ContentError> {
        let (type_, subtype) = (content_type.type_(), content_type.subtype());
        let contents: Box<dyn Contents> = if type_ == mime::TEXT || (type_ == mime::APPLICATION && subtype == "sdp") {
            Box::new(PlainContents::parse(content_type.clone(), &body)?)
        } else if type_ == "message" && subtype == "sipfrag" {
            Box::new(SipFragContents::parse(content_type.clone(), body)?)
        } else {
            Box::new(OctetContents::new(content_type.clone(), body))
        };
        Ok(contents)
    }
}

/// A UTF-8 text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainContents {
    content_type: Mime,
    text: String,
}

impl PlainContents {
    pub fn new<S: Into<String>>(content_type: Mime, text: S) -> Self {
        Self { content_type, text: text.into() }
    }

    fn parse(content_type: Mime, body: &[u8]) -> Result<Self, ContentError> {
        let text = std::str::from_utf8(body).map_err(|e| ContentError::malformed(&content_type, e))?;
        Ok(Self::new(content_type, text))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text<S: Into<String>>(&mut self, text: S) {
        self.text = text.into();
    }
}

impl Contents for PlainContents {
    fn content_type(&self) -> &Mime {
        &self.content_type
    }

    fn encode(&self, dst: &mut BytesMut) -> io::Result<()> {
        dst.put_slice(self.text.as_bytes());
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Contents> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A body kept as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OctetContents {
    content_type: Mime,
    bytes: Bytes,
}

impl OctetContents {
    pub fn new(content_type: Mime, bytes: Bytes) -> Self {
        Self { content_type, bytes }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

impl Contents for OctetContents {
    fn content_type(&self) -> &Mime {
        &self.content_type
    }

    fn encode(&self, dst: &mut BytesMut) -> io::Result<()> {
        dst.put_slice(&self.bytes);
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn Contents> {
        // deep copy, the clone must not share the body with the source
        Box::new(Self { content_type: self.content_type.clone(), bytes: Bytes::copy_from_slice(&self.bytes) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A SIP message embedded as a `message/sipfrag` body.
#[derive(Debug, Clone)]
pub struct SipFragContents {
    content_type: Mime,
    message: SipMessage,
}

impl SipFragContents {
    pub fn new(message: SipMessage) -> Self {
        let content_type = "message/sipfrag".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM);
        Self { content_type, message }
    }

    fn parse(content_type: Mime, body: Bytes) -> Result<Self, ContentError> {
        let message = SipMessage::parse_fragment(body).map_err(|e| ContentError::malformed(&content_type, e))?;
        Ok(Self { content_type, message })
    }

    pub fn message(&self) -> &SipMessage {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut SipMessage {
        &mut self.message
    }
}

impl Contents for SipFragContents {
    fn content_type(&self) -> &Mime {
        &self.content_type
    }

    fn encode(&self, dst: &mut BytesMut) -> io::Result<()> {
        encode_sip_frag(&self.message, dst).map_err(io::Error::other)
    }

    fn clone_box(&self) -> Box<dyn Contents> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
