//! The SIP message: a start line, a header slot table, a body, and the
//! routing and security metadata the stack attaches on the way.
//!
//! Headers stay raw until they are accessed through a typed accessor. The
//! first typed access parses the whole slot and keeps the parsed values; from
//! then on they are what gets encoded. Raw accessors see the same state,
//! rendered back from the typed values.
//!
//! ```
//! use bytes::Bytes;
//! use micro_sip::protocol::{h, SipMessage};
//!
//! let raw = Bytes::from_static(
//!     b"OPTIONS sip:carol@chicago.com SIP/2.0\r\n\
//!       Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bKhjhs8ass877\r\n\
//!       CSeq: 63104 OPTIONS\r\n\
//!       Content-Length: 0\r\n\r\n",
//! );
//! let mut message = SipMessage::parse(raw, true).unwrap();
//! assert!(message.is_request());
//! assert_eq!(message.header::<h::CSeq>().unwrap().sequence(), 63104);
//! ```

use std::fmt;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use crate::codec::{encode_brief, encode_message, encode_sip_frag, HeaderDecoder};
use crate::config::ParseConfig;
use crate::grammar::{percent_decode, HeaderValue, MimeCategory, StringCategory, Uri};
use crate::protocol::raw::{BufferArena, RawField, RawRange};
use crate::protocol::slot::{HeaderSlot, HeaderStore, ParserContainer};
use crate::protocol::{
    h, ContentError, ContentFactory, Contents, ContractError, DecoratorHandle, DecoratorRegistry,
    DefaultContentFactory, EncodeError, HeaderParseError, HeaderToken, HeaderType, Method, MultiHeader,
    ParseError, RequestLine, SecurityAttributes, SingleHeader, SipError, StartLine, StatusLine,
    TransactionId, Tuple,
};

/// Reference point for [`SipMessage::created_time_micros`].
static PROCESS_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// The message body: nothing, raw bytes from the arena, or parsed contents.
#[derive(Debug, Clone, Default)]
pub(crate) enum Body {
    #[default]
    Empty,
    Raw(RawRange),
    Typed(Box<dyn Contents>),
}

/// A SIP request or response.
#[derive(Debug)]
pub struct SipMessage {
    is_external: bool,
    pub(crate) start_line: Option<StartLine>,
    pub(crate) arena: BufferArena,
    pub(crate) headers: HeaderStore,
    pub(crate) body: Body,
    pub(crate) transaction_id: Option<TransactionId>,
    pub(crate) rfc2543_transaction_id: Option<String>,
    pub(crate) rfc2543_forced: bool,
    source: Tuple,
    destination: Tuple,
    security_attributes: Option<SecurityAttributes>,
    tls_domain: String,
    tls_peer_names: Vec<String>,
    force_target: Option<Uri>,
    outbound_decorators: Vec<DecoratorHandle>,
    is_decorated: bool,
    invalid: Option<String>,
    created: Instant,
}

impl SipMessage {
    /// An empty message with no start line yet.
    pub fn new(is_external: bool) -> Self {
        Self {
            is_external,
            start_line: None,
            arena: BufferArena::new(),
            headers: HeaderStore::new(),
            body: Body::Empty,
            transaction_id: None,
            rfc2543_transaction_id: None,
            rfc2543_forced: false,
            source: Tuple::default(),
            destination: Tuple::default(),
            security_attributes: None,
            tls_domain: String::new(),
            tls_peer_names: Vec::new(),
            force_target: None,
            outbound_decorators: Vec::new(),
            is_decorated: false,
            invalid: None,
            created: Instant::now(),
        }
    }

    /// A locally built request.
    pub fn request(method: Method, uri: Uri) -> Self {
        let mut message = Self::new(false);
        message.start_line = Some(StartLine::Request(RequestLine::new(method, uri)));
        message
    }

    /// A locally built response.
    pub fn response<R: Into<String>>(code: u16, reason: R) -> Self {
        let mut message = Self::new(false);
        message.start_line = Some(StartLine::Response(StatusLine::new(code, reason)));
        message
    }

    /// Parses one complete message (a datagram, or a frame cut by
    /// [`MessageDecoder`](crate::codec::MessageDecoder)) using the global config.
    pub fn parse(bytes: Bytes, is_external: bool) -> Result<Self, ParseError> {
        Self::parse_with(bytes, is_external, &ParseConfig::global())
    }

    pub fn parse_with(bytes: Bytes, is_external: bool, config: &ParseConfig) -> Result<Self, ParseError> {
        HeaderDecoder::new(*config, is_external).parse_message(bytes)
    }

    /// Parses a `message/sipfrag` body: the start line is optional and the
    /// trailing blank line may be missing.
    pub fn parse_fragment(bytes: Bytes) -> Result<Self, ParseError> {
        HeaderDecoder::new(ParseConfig::global(), false).parse_fragment(bytes)
    }

    // ===== start line =====

    pub fn start_line(&self) -> Option<&StartLine> {
        self.start_line.as_ref()
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, Some(StartLine::Request(_)))
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start_line, Some(StartLine::Response(_)))
    }

    pub fn request_line(&self) -> Result<&RequestLine, ContractError> {
        match &self.start_line {
            Some(StartLine::Request(line)) => Ok(line),
            Some(StartLine::Response(_)) => Err(ContractError::NotARequest),
            None => Err(ContractError::NoStartLine),
        }
    }

    pub fn request_line_mut(&mut self) -> Result<&mut RequestLine, ContractError> {
        match &mut self.start_line {
            Some(StartLine::Request(line)) => Ok(line),
            Some(StartLine::Response(_)) => Err(ContractError::NotARequest),
            None => Err(ContractError::NoStartLine),
        }
    }

    pub fn status_line(&self) -> Result<&StatusLine, ContractError> {
        match &self.start_line {
            Some(StartLine::Response(line)) => Ok(line),
            Some(StartLine::Request(_)) => Err(ContractError::NotAResponse),
            None => Err(ContractError::NoStartLine),
        }
    }

    pub fn status_line_mut(&mut self) -> Result<&mut StatusLine, ContractError> {
        match &mut self.start_line {
            Some(StartLine::Response(line)) => Ok(line),
            Some(StartLine::Request(_)) => Err(ContractError::NotAResponse),
            None => Err(ContractError::NoStartLine),
        }
    }

    /// Parses `line` right away. A malformed line marks the message invalid
    /// and leaves it without a start line.
    pub fn set_start_line(&mut self, line: &[u8]) {
        let parsed = std::str::from_utf8(line)
            .map_err(|e| format!("start line is not utf-8: {e}"))
            .and_then(|line| StartLine::parse(line).map_err(|e| format!("malformed start line {line:?}: {e}")));

        match parsed {
            Ok(start_line) => self.start_line = Some(start_line),
            Err(reason) => {
                self.start_line = None;
                self.mark_invalid(reason);
            }
        }
    }

    pub fn set_request_line(&mut self, line: RequestLine) {
        self.start_line = Some(StartLine::Request(line));
    }

    pub fn set_status_line(&mut self, line: StatusLine) {
        self.start_line = Some(StartLine::Response(line));
    }

    /// The request method, or for a response the method in its CSeq.
    pub fn method(&mut self) -> Result<Method, SipError> {
        if let Some(StartLine::Request(line)) = &self.start_line {
            return Ok(line.method().clone());
        }
        Ok(self.header::<h::CSeq>()?.method().clone())
    }

    fn check_start_line(&self) -> Result<(), ContractError> {
        match self.start_line {
            Some(_) => Ok(()),
            None => Err(ContractError::NoStartLine),
        }
    }

    // ===== typed headers =====

    /// The single value of header `H`, promoting the slot on first access.
    pub fn header<H: SingleHeader>(&mut self) -> Result<&mut H::Value, SipError> {
        self.check_start_line()?;
        let name = H::TYPE.name();
        let slot = self.headers.get_mut(H::TYPE).ok_or_else(|| ContractError::header_missing(name))?;
        let values = slot.promote::<H::Value>(&self.arena, name, H::TYPE.is_comma_list())?;

        match values.len() {
            1 => Ok(&mut values[0]),
            0 => Err(ContractError::header_missing(name).into()),
            count => Err(HeaderParseError::new(name, "", format!("expect exactly one value, found {count}")).into()),
        }
    }

    /// All values of header `H`. An absent header yields an empty container
    /// that stays in the message.
    pub fn headers<H: MultiHeader>(&mut self) -> Result<&mut ParserContainer<H::Value>, SipError> {
        self.check_start_line()?;
        let slot = self.headers.get_or_insert_parsed::<H::Value>(H::TYPE);
        Ok(slot.promote::<H::Value>(&self.arena, H::TYPE.name(), H::TYPE.is_comma_list())?)
    }

    /// Replaces header `H` with a single typed value.
    pub fn set_header<H: SingleHeader>(&mut self, value: H::Value) {
        self.set_values::<H>(vec![value]);
    }

    /// Replaces all values of header `H`.
    pub fn set_values<H: HeaderToken>(&mut self, values: Vec<H::Value>) {
        self.headers.set(H::TYPE, HeaderSlot::Parsed(Box::new(ParserContainer::from(values))));
    }

    /// Values of an extension header, free-form text kept verbatim.
    /// The values of an extension header, created empty when absent.
    ///
    /// Names of known headers, compact forms included, are refused: those
    /// live in their typed slot.
    pub fn extension_header(&mut self, name: &str) -> Result<&mut ParserContainer<StringCategory>, SipError> {
        self.check_start_line()?;
        if let Some(header_type) = HeaderType::from_name(name) {
            return Err(ContractError::known_header(header_type.name()).into());
        }
        let slot = self.headers.unknown_or_insert::<StringCategory>(name);
        Ok(slot.promote::<StringCategory>(&self.arena, name, false)?)
    }

    pub fn exists_extension(&self, name: &str) -> bool {
        self.headers.get_unknown(name).is_some()
    }

    pub fn remove_extension(&mut self, name: &str) -> bool {
        self.headers.remove_unknown(name)
    }

    /// Promotes every populated slot, stopping at the first that fails to parse.
    pub fn parse_all_headers(&mut self) -> Result<(), SipError> {
        self.check_start_line()?;
        for header_type in self.headers.known_types() {
            if let Some(slot) = self.headers.get_mut(header_type) {
                header_type.promote(slot, &self.arena)?;
            }
        }
        let names: Vec<String> = self.headers.unknown().iter().map(|header| header.name().to_string()).collect();
        for name in names {
            self.extension_header(&name)?;
        }
        Ok(())
    }

    // ===== raw headers =====

    /// True when the header is present, raw or parsed, even with no values left.
    pub fn exists(&self, header_type: HeaderType) -> bool {
        self.headers.get(header_type).is_some()
    }

    /// True when the header is absent or has no values.
    pub fn empty(&self, header_type: HeaderType) -> bool {
        self.headers.get(header_type).is_none_or(HeaderSlot::is_empty)
    }

    /// Drops both the raw and the parsed state of a header.
    pub fn remove(&mut self, header_type: HeaderType) {
        self.headers.remove(header_type);
    }

    /// The header values as bytes. Parsed slots are rendered from their typed values.
    pub fn get_raw_header(&self, header_type: HeaderType) -> Option<Vec<Bytes>> {
        self.headers.get(header_type).map(|slot| slot.raw_values(&self.arena))
    }

    /// Replaces a header with raw values, dropping any parsed state.
    pub fn set_raw_header<I, B>(&mut self, header_type: HeaderType, values: I)
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let fields = values.into_iter().map(|value| RawField::new(None, self.arena.push_slice(value.as_ref()))).collect();
        self.headers.set(header_type, HeaderSlot::Raw(fields));
    }

    /// Appends a raw header line, known or extension. Nothing is parsed.
    pub fn add_header(&mut self, name: &str, value: &[u8]) {
        let name_range = self.arena.push_slice(name.trim().as_bytes());
        let value_range = self.arena.push_slice(value);
        self.add_raw_field(name.trim(), name_range, value_range);
    }

    pub(crate) fn add_raw_field(&mut self, name: &str, name_range: RawRange, value_range: RawRange) {
        let field = RawField::new(Some(name_range), value_range);
        match HeaderType::from_name(name) {
            Some(header_type) => self.headers.push_raw(header_type, field, &mut self.arena),
            None => self.headers.push_unknown_raw(name, field, &mut self.arena),
        }
    }

    /// Extension headers in insertion order with their values as bytes.
    pub fn raw_unknown_headers(&self) -> Vec<(&str, Vec<Bytes>)> {
        self.headers.unknown().iter().map(|header| (header.name(), header.slot().raw_values(&self.arena))).collect()
    }

    /// Known headers currently present, in encode order.
    pub fn header_types(&self) -> Vec<HeaderType> {
        self.headers.known_types()
    }

    /// First value of a header without caching the parse; for diagnostics.
    pub(crate) fn peek<T: HeaderValue>(&self, header_type: HeaderType) -> Option<T> {
        match self.headers.get(header_type)? {
            HeaderSlot::Parsed(values) => values.as_any().downcast_ref::<ParserContainer<T>>()?.first().cloned(),
            HeaderSlot::Raw(fields) => {
                let raw = std::str::from_utf8(self.arena.slice(fields.first()?.value())).ok()?;
                let first = if header_type.is_comma_list() {
                    crate::grammar::split_comma_list(raw).into_iter().next()?
                } else {
                    raw
                };
                T::parse_value(first).ok()
            }
        }
    }

    // ===== body =====

    /// Parsed contents with the default factory.
    pub fn contents(&mut self) -> Result<Option<&mut dyn Contents>, SipError> {
        self.contents_with(&DefaultContentFactory)
    }

    /// Parsed contents, turning the raw body into typed contents on first access.
    pub fn contents_with<F: ContentFactory + ?Sized>(&mut self, factory: &F) -> Result<Option<&mut dyn Contents>, SipError> {
        if let Body::Raw(range) = self.body {
            let content_type = self.content_type()?;
            let contents = factory.create_content(&content_type, self.arena.get(range))?;
            trace!(content_type = %content_type, size = range.len(), "parsed message contents");
            self.body = Body::Typed(contents);
        }

        match &mut self.body {
            Body::Typed(contents) => Ok(Some(contents.as_mut())),
            Body::Empty | Body::Raw(_) => Ok(None),
        }
    }

    fn content_type(&mut self) -> Result<mime::Mime, SipError> {
        let Some(slot) = self.headers.get_mut(HeaderType::ContentType) else {
            return Err(ContentError::MissingContentType.into());
        };
        let values = slot.promote::<MimeCategory>(&self.arena, HeaderType::ContentType.name(), false)?;
        match values.first() {
            Some(content_type) => Ok(content_type.mime().clone()),
            None => Err(ContentError::MissingContentType.into()),
        }
    }

    /// Takes ownership of `contents`; Content-Type follows its media type.
    pub fn set_contents(&mut self, contents: Box<dyn Contents>) {
        self.set_header::<h::ContentType>(MimeCategory::new(contents.content_type().clone()));
        self.headers.remove(HeaderType::ContentLength);
        self.body = Body::Typed(contents);
    }

    /// Moves the contents out, leaving the message without a body and without
    /// the headers describing it.
    pub fn release_contents(&mut self) -> Result<Option<Box<dyn Contents>>, SipError> {
        if matches!(self.body, Body::Raw(_)) {
            self.contents()?;
        }
        let released = match std::mem::take(&mut self.body) {
            Body::Typed(contents) => Some(contents),
            Body::Empty | Body::Raw(_) => None,
        };
        for header_type in [
            HeaderType::ContentType,
            HeaderType::ContentDisposition,
            HeaderType::ContentEncoding,
            HeaderType::ContentLanguage,
            HeaderType::ContentLength,
        ] {
            self.headers.remove(header_type);
        }
        Ok(released)
    }

    /// Sets the raw body, dropping any parsed contents.
    pub fn set_body(&mut self, body: &[u8]) {
        self.body = if body.is_empty() { Body::Empty } else { Body::Raw(self.arena.push_slice(body)) };
        self.headers.remove(HeaderType::ContentLength);
    }

    pub(crate) fn set_body_range(&mut self, range: RawRange) {
        self.body = if range.is_empty() { Body::Empty } else { Body::Raw(range) };
    }

    pub fn has_body(&self) -> bool {
        !matches!(self.body, Body::Empty)
    }

    /// The body as it would be written.
    pub fn body_bytes(&self) -> Result<Bytes, EncodeError> {
        match &self.body {
            Body::Empty => Ok(Bytes::new()),
            Body::Raw(range) => Ok(self.arena.get(*range)),
            Body::Typed(contents) => {
                let mut dst = BytesMut::new();
                contents.encode(&mut dst)?;
                Ok(dst.freeze())
            }
        }
    }

    // ===== encoding =====

    /// The wire form. Refuses invalid messages and messages without a start line.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        let mut dst = BytesMut::new();
        encode_message(self, &mut dst)?;
        Ok(dst.freeze())
    }

    /// The form used to embed a message in a `message/sipfrag` body.
    pub fn encode_sip_frag(&self) -> Result<Bytes, EncodeError> {
        let mut dst = BytesMut::new();
        encode_sip_frag(self, &mut dst)?;
        Ok(dst.freeze())
    }

    /// A one-line summary for logs, never fails.
    pub fn encode_brief(&self) -> String {
        encode_brief(self)
    }

    // ===== validity =====

    pub fn is_invalid(&self) -> bool {
        self.invalid.is_some()
    }

    pub fn invalid_reason(&self) -> Option<&str> {
        self.invalid.as_deref()
    }

    /// Marks the message invalid. The first reason is kept; there is no way back.
    pub fn mark_invalid<S: Into<String>>(&mut self, reason: S) {
        let reason = reason.into();
        debug!(reason = %reason, "message marked invalid");
        self.invalid.get_or_insert(reason);
    }

    // ===== origin =====

    pub fn is_external(&self) -> bool {
        self.is_external
    }

    /// Marks the message as built by the transaction user.
    pub fn set_from_tu(&mut self) {
        self.is_external = false;
    }

    pub fn set_from_external(&mut self) {
        self.is_external = true;
    }

    /// True for a response from the wire or a request built locally.
    pub fn is_client_transaction(&self) -> bool {
        (self.is_external && self.is_response()) || (!self.is_external && self.is_request())
    }

    /// Microseconds since process start at which the message was created.
    pub fn created_time_micros(&self) -> u64 {
        u64::try_from(self.created.saturating_duration_since(*PROCESS_EPOCH).as_micros()).unwrap_or(u64::MAX)
    }

    // ===== routing and security metadata =====

    pub fn source(&self) -> &Tuple {
        &self.source
    }

    pub fn set_source(&mut self, source: Tuple) {
        self.source = source;
    }

    pub fn destination(&self) -> &Tuple {
        &self.destination
    }

    pub fn set_destination(&mut self, destination: Tuple) {
        self.destination = destination;
    }

    pub fn force_target(&self) -> Option<&Uri> {
        self.force_target.as_ref()
    }

    pub fn has_force_target(&self) -> bool {
        self.force_target.is_some()
    }

    /// Sends the message to `target` regardless of its Request-URI and routes.
    pub fn set_force_target(&mut self, target: Uri) {
        self.force_target = Some(target);
    }

    pub fn clear_force_target(&mut self) {
        self.force_target = None;
    }

    pub fn tls_domain(&self) -> &str {
        &self.tls_domain
    }

    pub fn set_tls_domain<S: Into<String>>(&mut self, domain: S) {
        self.tls_domain = domain.into();
    }

    pub fn tls_peer_names(&self) -> &[String] {
        &self.tls_peer_names
    }

    pub fn set_tls_peer_names(&mut self, names: Vec<String>) {
        self.tls_peer_names = names;
    }

    pub fn security_attributes(&self) -> Option<&SecurityAttributes> {
        self.security_attributes.as_ref()
    }

    pub fn set_security_attributes(&mut self, attributes: SecurityAttributes) {
        self.security_attributes = Some(attributes);
    }

    pub fn take_security_attributes(&mut self) -> Option<SecurityAttributes> {
        self.security_attributes.take()
    }

    // ===== decoration =====

    pub fn add_outbound_decorator(&mut self, handle: DecoratorHandle) {
        self.outbound_decorators.push(handle);
    }

    pub fn outbound_decorators(&self) -> &[DecoratorHandle] {
        &self.outbound_decorators
    }

    pub fn clear_outbound_decorators(&mut self) {
        self.outbound_decorators.clear();
    }

    /// Runs every added decorator in insertion order. Called once per send attempt.
    pub fn call_outbound_decorators(&mut self, registry: &DecoratorRegistry, source: &Tuple, destination: &Tuple) {
        let handles = self.outbound_decorators.clone();
        for handle in handles {
            match registry.get(handle) {
                Some(decorator) => decorator.decorate(self, source, destination),
                None => warn!(handle = handle.index(), "{}", ContractError::UnknownDecorator { handle: handle.index() }),
            }
        }
        self.is_decorated = true;
    }

    pub fn is_decorated(&self) -> bool {
        self.is_decorated
    }

    // ===== uri merging and identity =====

    /// Copies the headers embedded in `uri` into the message. The `body`
    /// pseudo-header sets the body.
    pub fn merge_uri(&mut self, uri: &Uri) {
        for (name, value) in uri.embedded_headers() {
            let value = percent_decode(value);
            if name.eq_ignore_ascii_case("body") {
                self.set_body(value.as_bytes());
            } else {
                self.add_header(&percent_decode(name), value.as_bytes());
            }
        }
    }

    /// The RFC 4474 digest string:
    /// `from-uri|to-uri|call-id|cseq-number method|Date|contact-uri|body`.
    pub fn canonical_identity_string(&mut self) -> Result<String, SipError> {
        let from = self.header::<h::From>()?.uri().address_of_record();
        let to = self.header::<h::To>()?.uri().address_of_record();
        let call_id = self.header::<h::CallId>()?.value().to_string();
        let cseq = self.header::<h::CSeq>()?.to_string();
        let date = match self.headers.get(HeaderType::Date) {
            Some(_) => self.header::<h::Date>()?.value().to_string(),
            None => String::new(),
        };
        let contact = match self.headers::<h::Contacts>()?.first() {
            Some(contact) => contact.uri().address_of_record(),
            None => String::new(),
        };
        let body = self.body_bytes()?;

        Ok(format!("{from}|{to}|{call_id}|{cseq}|{date}|{contact}|{}", String::from_utf8_lossy(&body)))
    }
}

impl Clone for SipMessage {
    /// A fully independent copy: live buffers, parsed slots and contents are
    /// all duplicated. Buffers nothing refers to any more are left behind.
    /// The copy gets its own creation time.
    fn clone(&self) -> Self {
        let body_range = match &self.body {
            Body::Raw(range) => Some(*range),
            Body::Empty | Body::Typed(_) => None,
        };
        Self {
            is_external: self.is_external,
            start_line: self.start_line.clone(),
            arena: self.arena.copy_live(self.headers.raw_ranges().chain(body_range)),
            headers: self.headers.clone(),
            body: self.body.clone(),
            transaction_id: self.transaction_id.clone(),
            rfc2543_transaction_id: self.rfc2543_transaction_id.clone(),
            rfc2543_forced: self.rfc2543_forced,
            source: self.source,
            destination: self.destination,
            security_attributes: self.security_attributes.clone(),
            tls_domain: self.tls_domain.clone(),
            tls_peer_names: self.tls_peer_names.clone(),
            force_target: self.force_target.clone(),
            outbound_decorators: self.outbound_decorators.clone(),
            is_decorated: self.is_decorated,
            invalid: self.invalid.clone(),
            created: Instant::now(),
        }
    }
}

impl fmt::Display for SipMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_brief(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{CSeq, CallId, NameAddr, Via};
    use crate::protocol::{OctetContents, PlainContents, SipFragContents};
    use indoc::indoc;

    fn crlf(text: &str) -> Bytes {
        Bytes::from(text.replace('\n', "\r\n"))
    }

    const INVITE: &str = indoc! {"
        INVITE sip:bob@biloxi.com SIP/2.0
        Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds
        Max-Forwards: 70
        From: Alice <sip:alice@atlanta.com>;tag=1928301774
        To: Bob <sip:bob@biloxi.com>
        Call-ID: a84b4c76e66710@pc33.atlanta.com
        CSeq: 314159 INVITE
        Contact: <sip:alice@pc33.atlanta.com>
        Content-Type: application/sdp
        Content-Length: 5

        v=0
    "};

    const RINGING: &str = indoc! {"
        SIP/2.0 180 Ringing
        Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds;received=192.0.2.1
        From: Alice <sip:alice@atlanta.com>;tag=1928301774
        To: Bob <sip:bob@biloxi.com>;tag=a6c85cf
        Call-ID: a84b4c76e66710@pc33.atlanta.com
        CSeq: 314159 INVITE
        Content-Length: 0

    "};

    fn invite() -> SipMessage {
        SipMessage::parse(crlf(INVITE), true).unwrap()
    }

    #[test]
    fn request_properties() {
        let mut message = invite();

        assert!(message.is_request());
        assert!(!message.is_response());
        assert!(!message.is_invalid());
        assert_eq!(message.method().unwrap(), Method::Invite);
        assert_eq!(message.request_line().unwrap().uri().to_string(), "sip:bob@biloxi.com");
        assert_eq!(message.status_line().unwrap_err(), ContractError::NotAResponse);
    }

    #[test]
    fn response_method_comes_from_cseq() {
        let mut message = SipMessage::parse(crlf(RINGING), true).unwrap();

        assert!(message.is_response());
        assert_eq!(message.status_line().unwrap().code(), 180);
        assert_eq!(message.method().unwrap(), Method::Invite);
        assert_eq!(message.request_line().unwrap_err(), ContractError::NotARequest);
    }

    #[test]
    fn raw_message_round_trips() {
        let raw = crlf(INVITE);
        let message = SipMessage::parse(raw.clone(), true).unwrap();

        assert_eq!(message.encode().unwrap(), raw);
    }

    #[test]
    fn headers_stay_raw_until_accessed() {
        let mut message = invite();
        assert!(!message.headers.get(HeaderType::CSeq).unwrap().is_parsed());

        message.header::<h::CSeq>().unwrap();
        assert!(message.headers.get(HeaderType::CSeq).unwrap().is_parsed());
        assert!(!message.headers.get(HeaderType::From).unwrap().is_parsed());
    }

    #[test]
    fn promotion_is_idempotent() {
        let mut message = invite();

        let first = message.header::<h::From>().unwrap().clone();
        let second = message.header::<h::From>().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(first.tag(), Some("1928301774"));
        assert_eq!(first.display_name(), Some("Alice"));
    }

    #[test]
    fn typed_mutation_is_visible_in_raw_and_encoding() {
        let mut message = invite();
        message.header::<h::CSeq>().unwrap().set_sequence(314_160);
        let via = Via::new("TCP", "proxy.biloxi.com", Some(5060)).with_branch("z9hG4bKnew");
        message.headers::<h::Vias>().unwrap().insert(0, via);

        assert_eq!(message.get_raw_header(HeaderType::CSeq).unwrap(), vec![Bytes::from_static(b"314160 INVITE")]);

        let encoded = message.encode().unwrap();
        let text = std::str::from_utf8(&encoded).unwrap();
        assert!(text.contains("CSeq: 314160 INVITE\r\n"));
        assert!(text.contains(concat!(
            "Via: SIP/2.0/TCP proxy.biloxi.com:5060;branch=z9hG4bKnew\r\n",
            "Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds\r\n",
        )));
        assert!(!text.contains("314159"));
    }

    #[test]
    fn broken_header_does_not_invalidate_the_message() {
        let raw = crlf(indoc! {"
            OPTIONS sip:carol@chicago.com SIP/2.0
            CSeq: abc OPTIONS
            Call-ID: 1234@host
            Content-Length: 0

        "});
        let mut message = SipMessage::parse(raw, true).unwrap();

        let SipError::Header { source } = message.header::<h::CSeq>().unwrap_err() else { panic!("expect header error") };
        assert_eq!(source.header(), "CSeq");
        assert_eq!(source.raw(), "abc OPTIONS");

        assert!(!message.is_invalid());
        assert_eq!(message.header::<h::CallId>().unwrap().value(), "1234@host");
        assert_eq!(message.get_raw_header(HeaderType::CSeq).unwrap(), vec![Bytes::from_static(b"abc OPTIONS")]);
    }

    #[test]
    fn single_header_contracts() {
        let mut message = invite();
        assert!(matches!(
            message.header::<h::Expires>(),
            Err(SipError::Contract { source: ContractError::HeaderMissing { .. } })
        ));

        message.add_header("Call-ID", b"second@host");
        assert!(matches!(message.header::<h::CallId>(), Err(SipError::Header { .. })));

        let mut empty = SipMessage::new(false);
        assert!(matches!(empty.header::<h::CSeq>(), Err(SipError::Contract { source: ContractError::NoStartLine })));
        assert!(matches!(empty.method(), Err(SipError::Contract { source: ContractError::NoStartLine })));
    }

    #[test]
    fn exists_empty_remove() {
        let mut message = invite();

        assert!(message.exists(HeaderType::Via));
        assert!(!message.empty(HeaderType::Via));
        assert!(!message.exists(HeaderType::Route));
        assert!(message.empty(HeaderType::Route));

        message.headers::<h::Vias>().unwrap().clear();
        assert!(message.exists(HeaderType::Via));
        assert!(message.empty(HeaderType::Via));

        message.remove(HeaderType::Via);
        assert!(!message.exists(HeaderType::Via));
        assert!(message.get_raw_header(HeaderType::Via).is_none());
    }

    #[test]
    fn set_raw_header_drops_parsed_state() {
        let mut message = invite();
        message.header::<h::MaxForwards>().unwrap().set_value(10);

        message.set_raw_header(HeaderType::MaxForwards, ["69"]);
        assert_eq!(message.header::<h::MaxForwards>().unwrap().value(), 69);
    }

    #[test]
    fn compact_and_extension_headers() {
        let raw = crlf(indoc! {"
            MESSAGE sip:user2@domain.com SIP/2.0
            v: SIP/2.0/TCP user1pc.domain.com;branch=z9hG4bK776sgdkse
            i: asd88asd77a@1.2.3.4
            X-Foo: one
            l: 0
            x-foo: two

        "});
        let mut message = SipMessage::parse(raw, true).unwrap();

        assert_eq!(message.header::<h::CallId>().unwrap().value(), "asd88asd77a@1.2.3.4");
        assert_eq!(message.headers::<h::Vias>().unwrap()[0].transport(), "TCP");

        let unknown = message.raw_unknown_headers();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].0, "X-Foo");
        assert_eq!(unknown[0].1, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);

        let values: Vec<String> = message.extension_header("X-FOO").unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(values, vec!["one", "two"]);
        assert!(message.remove_extension("x-foo"));
        assert!(!message.exists_extension("X-Foo"));
    }

    #[test]
    fn known_names_are_not_extensions() {
        let mut message = invite();
        for name in ["Via", "call-id", "v", " CSeq "] {
            let error = message.extension_header(name).unwrap_err();
            assert!(matches!(error, SipError::Contract { source: ContractError::KnownHeader { .. } }));
        }

        assert!(message.raw_unknown_headers().is_empty());
        assert_eq!(message.headers::<h::Vias>().unwrap().len(), 1);
        let encoded = message.encode().unwrap();
        assert_eq!(encoded.windows(4).filter(|window| *window == b"Via:").count(), 1);
    }

    #[test]
    fn add_header_after_promotion_appends() {
        let mut message = invite();
        message.headers::<h::Vias>().unwrap();

        message.add_header("Via", b"SIP/2.0/UDP second.example.com");
        let vias = message.headers::<h::Vias>().unwrap();
        assert_eq!(vias.len(), 2);
        assert_eq!(vias[1].sent_host(), "second.example.com");
    }

    #[test]
    fn parse_all_headers_surfaces_first_failure() {
        let mut message = invite();
        message.parse_all_headers().unwrap();
        assert!(message.header_types().iter().all(|header_type| message.headers.get(*header_type).unwrap().is_parsed()));

        message.set_raw_header(HeaderType::MaxForwards, ["lots"]);
        assert!(matches!(message.parse_all_headers(), Err(SipError::Header { .. })));
    }

    #[test]
    fn clone_is_independent() {
        let mut original = invite();
        original.header::<h::To>().unwrap();

        let mut cloned = original.clone();
        cloned.header::<h::To>().unwrap().set_tag("cloned");
        cloned.header::<h::CSeq>().unwrap().set_sequence(1);
        cloned.set_body(b"v=1\r\n");
        cloned.add_header("Subject", b"changed");

        assert_eq!(original.header::<h::To>().unwrap().tag(), None);
        assert_eq!(original.header::<h::CSeq>().unwrap().sequence(), 314_159);
        assert_eq!(original.body_bytes().unwrap(), Bytes::from_static(b"v=0\r\n"));
        assert!(!original.exists(HeaderType::Subject));

        drop(original);
        assert_eq!(cloned.header::<h::To>().unwrap().tag(), Some("cloned"));
        assert!(cloned.encode().is_ok());
    }

    #[test]
    fn clone_copies_contents() {
        let mut original = invite();
        original.contents().unwrap();

        let mut cloned = original.clone();
        let contents = cloned.contents().unwrap().unwrap();
        contents.as_any_mut().downcast_mut::<PlainContents>().unwrap().set_text("v=1\r\n");

        assert_eq!(original.body_bytes().unwrap(), Bytes::from_static(b"v=0\r\n"));
        assert_eq!(cloned.body_bytes().unwrap(), Bytes::from_static(b"v=1\r\n"));
    }

    #[test]
    fn clone_leaves_replaced_buffers_behind() {
        let mut message = invite();
        for round in 0..8 {
            message.set_body(format!("v={round}\r\n").as_bytes());
            message.set_raw_header(HeaderType::Subject, [format!("take {round}")]);
        }
        let buffers = message.arena.buffer_count();

        let cloned = message.clone();
        assert_eq!(cloned.arena.buffer_count(), buffers);
        assert!(cloned.arena.size() < message.arena.size());
        assert_eq!(cloned.body_bytes().unwrap(), Bytes::from_static(b"v=7\r\n"));
        assert_eq!(cloned.encode().unwrap(), message.encode().unwrap());
    }

    #[test]
    fn contents_are_parsed_lazily() {
        let mut message = invite();
        assert!(matches!(message.body, Body::Raw(_)));

        let contents = message.contents().unwrap().unwrap();
        assert_eq!(contents.content_type().essence_str(), "application/sdp");
        assert!(matches!(message.body, Body::Typed(_)));
    }

    #[test]
    fn body_without_content_type() {
        let mut message = invite();
        message.remove(HeaderType::ContentType);
        assert!(matches!(message.contents(), Err(SipError::Content { source: ContentError::MissingContentType })));
    }

    #[test]
    fn release_contents_leaves_message_bodiless() {
        let mut message = invite();
        let released = message.release_contents().unwrap().unwrap();

        assert_eq!(released.content_type().essence_str(), "application/sdp");
        assert!(!message.has_body());
        assert!(!message.exists(HeaderType::ContentType));
        assert!(message.contents().unwrap().is_none());
        assert!(message.encode().unwrap().ends_with(b"Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn set_contents_sets_content_type() {
        let mut message = SipMessage::request(Method::Message, Uri::sip("domain.com").with_user("user2"));
        message.set_contents(Box::new(OctetContents::new(mime::APPLICATION_OCTET_STREAM, Bytes::from_static(b"\x01\x02"))));

        let encoded = message.encode().unwrap();
        let text = String::from_utf8_lossy(&encoded);
        assert!(text.contains("Content-Type: application/octet-stream\r\n"));
        assert!(text.ends_with("Content-Length: 2\r\n\r\n\x01\x02"));
    }

    #[test]
    fn set_body_invalidates_contents() {
        let mut message = invite();
        message.contents().unwrap();
        message.set_body(b"v=0\r\no=- 1 1 IN IP4 1.2.3.4\r\n");

        let contents = message.contents().unwrap().unwrap();
        let plain = contents.as_any().downcast_ref::<PlainContents>().unwrap();
        assert!(plain.text().contains("o=-"));
    }

    #[test]
    fn sipfrag_body_round_trip() {
        let mut fragment = SipMessage::response(100, "Trying");
        fragment.set_header::<h::CSeq>(CSeq::new(1, Method::Refer));

        let mut notify = SipMessage::request(Method::Notify, Uri::sip("atlanta.com").with_user("alice"));
        notify.set_contents(Box::new(SipFragContents::new(fragment)));

        let encoded = notify.encode().unwrap();
        let mut parsed = SipMessage::parse(encoded, true).unwrap();
        let contents = parsed.contents().unwrap().unwrap();
        let frag = contents.as_any_mut().downcast_mut::<SipFragContents>().unwrap();
        assert_eq!(frag.message().status_line().unwrap().code(), 100);
        assert_eq!(frag.message_mut().header::<h::CSeq>().unwrap().method(), &Method::Refer);
    }

    #[test]
    fn malformed_start_line_marks_invalid() {
        let mut message = SipMessage::new(true);
        message.set_start_line(b"INVITE sip:bob@biloxi.com HTTP/1.1");

        assert!(message.is_invalid());
        assert!(message.start_line().is_none());
        assert!(message.invalid_reason().unwrap().contains("malformed start line"));

        message.set_start_line(b"SIP/2.0 200 OK");
        assert!(message.is_response());
        assert!(message.is_invalid());
    }

    #[test]
    fn mark_invalid_keeps_first_reason() {
        let mut message = invite();
        message.mark_invalid("first");
        message.mark_invalid("second");
        assert_eq!(message.invalid_reason(), Some("first"));
        assert!(message.encode().is_err());
        assert!(message.encode_sip_frag().is_ok());
    }

    #[test]
    fn client_transaction_direction() {
        let request = SipMessage::request(Method::Invite, Uri::sip("biloxi.com"));
        assert!(request.is_client_transaction());

        let mut response = SipMessage::parse(crlf(RINGING), true).unwrap();
        assert!(response.is_client_transaction());

        response.set_from_tu();
        assert!(!response.is_client_transaction());
        response.set_from_external();
        assert!(response.is_external());
    }

    #[test]
    fn build_request_programmatically() {
        let mut message = SipMessage::request(Method::Register, Uri::sip("registrar.biloxi.com"));
        let via = Via::new("UDP", "bobspc.biloxi.com", Some(5060)).with_branch("z9hG4bKnashds7");
        message.headers::<h::Vias>().unwrap().push(via);
        message.set_header::<h::From>(NameAddr::new(Uri::sip("biloxi.com").with_user("bob")).with_tag("456248"));
        message.set_header::<h::To>(NameAddr::new(Uri::sip("biloxi.com").with_user("bob")));
        message.set_header::<h::CallId>(CallId::new("843817637684230@998sdasdh09"));
        message.set_header::<h::CSeq>(CSeq::new(1826, Method::Register));

        let expected = crlf(indoc! {"
            REGISTER sip:registrar.biloxi.com SIP/2.0
            Via: SIP/2.0/UDP bobspc.biloxi.com:5060;branch=z9hG4bKnashds7
            From: <sip:bob@biloxi.com>;tag=456248
            To: <sip:bob@biloxi.com>
            Call-ID: 843817637684230@998sdasdh09
            CSeq: 1826 REGISTER
            Content-Length: 0

        "});
        assert_eq!(message.encode().unwrap(), expected);
    }

    #[test]
    fn merge_uri_copies_embedded_headers() {
        let uri: Uri = "sip:bob@biloxi.com?Subject=project%20x&X-Priority=urgent&body=hello".parse().unwrap();
        let mut message = SipMessage::request(Method::Message, uri.clone());
        message.set_header::<h::ContentType>(MimeCategory::new(mime::TEXT_PLAIN));
        message.merge_uri(&uri);

        assert_eq!(message.header::<h::Subject>().unwrap().value(), "project x");
        assert_eq!(message.extension_header("X-Priority").unwrap()[0].value(), "urgent");
        assert_eq!(message.body_bytes().unwrap(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn canonical_identity_string() {
        let raw = crlf(indoc! {"
            INVITE sip:bob@biloxi.example.org SIP/2.0
            From: Alice <sip:alice@example.com>;tag=1928301774
            To: Bob <sip:bob@example.org>
            Call-ID: a84b4c76e66710
            CSeq: 314159 INVITE
            Date: Thu, 21 Feb 2002 13:02:03 GMT
            Contact: <sip:alice@pc33.example.com>
            Content-Type: text/plain
            Content-Length: 2

            hi"});
        let mut message = SipMessage::parse(raw, true).unwrap();

        assert_eq!(
            message.canonical_identity_string().unwrap(),
            concat!(
                "sip:alice@example.com|sip:bob@example.org|a84b4c76e66710|314159 INVITE|",
                "Thu, 21 Feb 2002 13:02:03 GMT|sip:alice@pc33.example.com|hi",
            )
        );
    }

    #[test]
    fn metadata_accessors() {
        let mut message = invite();
        let target: Uri = "sip:10.0.0.9:5070".parse().unwrap();

        message.set_force_target(target.clone());
        assert_eq!(message.force_target(), Some(&target));
        message.clear_force_target();
        assert!(!message.has_force_target());

        message.set_tls_domain("biloxi.com");
        message.set_tls_peer_names(vec!["atlanta.com".to_string()]);
        assert_eq!(message.tls_domain(), "biloxi.com");
        assert_eq!(message.tls_peer_names().to_vec(), vec!["atlanta.com".to_string()]);

        message.set_security_attributes(SecurityAttributes::new().with_encrypted(true));
        assert!(message.security_attributes().unwrap().is_encrypted());
        assert!(message.take_security_attributes().is_some());
        assert!(message.security_attributes().is_none());

        let later = message.clone();
        assert!(later.created_time_micros() >= message.created_time_micros());
    }

    #[test]
    fn display_is_brief() {
        let message = invite();
        let brief = message.to_string();
        assert!(brief.starts_with("SipReq: INVITE sip:bob@biloxi.com"));
        assert!(brief.contains("tid=z9hG4bK776asdhds"));
        assert!(brief.contains("cseq=314159 INVITE"));
    }
}
