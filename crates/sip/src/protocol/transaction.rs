//! Transaction identity.
//!
//! A message resolves its transaction id once and keeps it. RFC 3261 peers
//! hand us the id in the `branch` of the top Via; for RFC 2543 peers we hash
//! the fields that scope a transaction instead. The variant tells the
//! transaction layer which of the two produced the id.

use std::fmt;

use bytes::Bytes;
use md5::{Digest, Md5};
use tracing::trace;

use crate::grammar::Via;
use crate::protocol::{h, ContractError, EncodeError, Method, SipError, SipMessage, StartLine};

/// The correlation key the transaction layer matches messages by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionId {
    /// Taken verbatim from the top Via `branch`.
    Branch(String),
    /// Synthesized for RFC 2543 peers, or forced by the caller.
    LegacyHash(String),
}

impl TransactionId {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionId::Branch(id) | TransactionId::LegacyHash(id) => id,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, TransactionId::LegacyHash(_))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SipMessage {
    /// The transaction id, resolved on first call and fixed afterwards.
    ///
    /// Resolution order: a legacy id set through
    /// [`set_rfc2543_transaction_id`](Self::set_rfc2543_transaction_id), then a
    /// top Via branch carrying the magic cookie, then the legacy hash.
    ///
    /// Responses never get a legacy hash: they answer a request we sent, so the
    /// top Via branch is ours and is taken as is, cookie or not.
    pub fn transaction_id(&mut self) -> Result<&TransactionId, SipError> {
        let id = match self.transaction_id.take() {
            Some(id) => id,
            None => self.resolve_transaction_id()?,
        };
        Ok(self.transaction_id.insert(id))
    }

    fn resolve_transaction_id(&mut self) -> Result<TransactionId, SipError> {
        if let Some(reason) = self.invalid_reason() {
            return Err(SipError::invalid_message(reason));
        }
        if let (true, Some(forced)) = (self.rfc2543_forced, &self.rfc2543_transaction_id) {
            return Ok(TransactionId::LegacyHash(forced.clone()));
        }

        let top_via = self.top_via()?;
        let id = match top_via.branch() {
            Some(branch) if top_via.has_rfc3261_branch() => TransactionId::Branch(branch.to_string()),
            Some(branch) if self.is_response() && !branch.is_empty() => TransactionId::Branch(branch.to_string()),
            _ => TransactionId::LegacyHash(self.rfc2543_transaction_id()?.to_string()),
        };
        trace!(transaction_id = %id, legacy = id.is_legacy(), "resolved transaction id");
        Ok(id)
    }

    fn top_via(&mut self) -> Result<Via, SipError> {
        let via = self.headers::<h::Vias>()?.first().cloned();
        via.ok_or_else(|| ContractError::header_missing("Via").into())
    }

    /// The legacy hash id, computed once and cached.
    pub fn rfc2543_transaction_id(&mut self) -> Result<&str, SipError> {
        let id = match self.rfc2543_transaction_id.take() {
            Some(id) => id,
            None => self.compute_2543_transaction_hash()?,
        };
        Ok(self.rfc2543_transaction_id.insert(id))
    }

    /// Forces the legacy id, e.g. for a message restored from persisted state.
    /// An id that was already resolved is left alone.
    pub fn set_rfc2543_transaction_id<S: Into<String>>(&mut self, id: S) {
        self.rfc2543_transaction_id = Some(id.into());
        self.rfc2543_forced = true;
    }

    /// MD5 over the fields RFC 3261 §17.2.3 uses to match RFC 2543 requests,
    /// in this order: Request-URI, top Via sent-protocol and sent-by, From tag,
    /// Call-ID, CSeq number and method, To tag.
    ///
    /// ACK and CANCEL hash their CSeq method as INVITE and, like INVITE, leave
    /// the To tag out, so both land on the id of the INVITE they refer to. The
    /// field separators are always written, so an absent field hashes as empty.
    ///
    /// Only requests have a legacy hash.
    pub fn compute_2543_transaction_hash(&mut self) -> Result<String, SipError> {
        if let Some(reason) = self.invalid_reason() {
            return Err(SipError::invalid_message(reason));
        }

        let uri = match &self.start_line {
            Some(StartLine::Request(line)) => line.uri().canonical(),
            Some(StartLine::Response(_)) => return Err(ContractError::NotARequest.into()),
            None => return Err(ContractError::NoStartLine.into()),
        };

        let mut hasher = Md5::new();
        hasher.update(uri);

        let via = self.top_via()?;
        hasher.update(b"|");
        hasher.update(via.protocol_name().to_ascii_uppercase());
        hasher.update(b"/");
        hasher.update(via.protocol_version());
        hasher.update(b"/");
        hasher.update(via.transport().to_ascii_uppercase());
        hasher.update(b"|");
        hasher.update(via.sent_host().to_ascii_lowercase());
        hasher.update(b":");
        hasher.update(via.sent_port().map(|port| port.to_string()).unwrap_or_default());

        hasher.update(b"|");
        hasher.update(self.header::<h::From>()?.tag().unwrap_or_default());
        hasher.update(b"|");
        hasher.update(self.header::<h::CallId>()?.value());

        let cseq = self.header::<h::CSeq>()?.clone();
        let invite_scoped = matches!(cseq.method(), Method::Invite | Method::Ack | Method::Cancel);
        hasher.update(b"|");
        hasher.update(cseq.sequence().to_string());
        hasher.update(b" ");
        hasher.update(if invite_scoped { Method::Invite.as_str() } else { cseq.method().as_str() });

        hasher.update(b"|");
        if !invite_scoped {
            hasher.update(self.header::<h::To>()?.tag().unwrap_or_default());
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

/// What the transaction layer needs from any message it carries.
pub trait TransactionMessage: Send {
    fn transaction_id(&mut self) -> Result<&TransactionId, SipError>;

    /// A one-line summary for logs.
    fn brief(&self) -> String;

    fn encode(&self) -> Result<Bytes, EncodeError>;

    fn is_client_transaction(&self) -> bool;

    fn clone_message(&self) -> Box<dyn TransactionMessage>;
}

impl TransactionMessage for SipMessage {
    fn transaction_id(&mut self) -> Result<&TransactionId, SipError> {
        SipMessage::transaction_id(self)
    }

    fn brief(&self) -> String {
        self.encode_brief()
    }

    fn encode(&self) -> Result<Bytes, EncodeError> {
        SipMessage::encode(self)
    }

    fn is_client_transaction(&self) -> bool {
        SipMessage::is_client_transaction(self)
    }

    fn clone_message(&self) -> Box<dyn TransactionMessage> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::BRANCH_MAGIC_COOKIE;
    use indoc::indoc;

    fn parse(text: &str) -> SipMessage {
        SipMessage::parse(Bytes::from(text.replace('\n', "\r\n")), true).unwrap()
    }

    const LEGACY_INVITE: &str = indoc! {"
        INVITE sip:bob@biloxi.com SIP/2.0
        Via: SIP/2.0/UDP pc33.atlanta.com:5060
        From: Alice <sip:alice@atlanta.com>;tag=1928301774
        To: Bob <sip:bob@biloxi.com>
        Call-ID: a84b4c76e66710@pc33.atlanta.com
        CSeq: 314159 INVITE
        Content-Length: 0

    "};

    const LEGACY_ACK: &str = indoc! {"
        ACK sip:bob@biloxi.com SIP/2.0
        Via: SIP/2.0/UDP pc33.atlanta.com:5060
        From: Alice <sip:alice@atlanta.com>;tag=1928301774
        To: Bob <sip:bob@biloxi.com>;tag=a6c85cf
        Call-ID: a84b4c76e66710@pc33.atlanta.com
        CSeq: 314159 ACK
        Content-Length: 0

    "};

    #[test]
    fn branch_is_the_id() {
        let mut message = parse(LEGACY_INVITE);
        message.headers::<h::Vias>().unwrap()[0].params_mut().set("branch", Some("z9hG4bK776asdhds".to_string()));

        assert_eq!(message.transaction_id().unwrap(), &TransactionId::Branch("z9hG4bK776asdhds".to_string()));
        assert!(message.rfc2543_transaction_id.is_none());
    }

    #[test]
    fn legacy_hash_is_deterministic() {
        let mut first = parse(LEGACY_INVITE);
        let mut second = parse(LEGACY_INVITE);
        let mut cloned = first.clone();

        let id = first.transaction_id().unwrap().clone();
        assert!(id.is_legacy());
        assert_eq!(id.as_str().len(), 32);
        assert_eq!(second.transaction_id().unwrap(), &id);
        assert_eq!(cloned.transaction_id().unwrap(), &id);
        assert_eq!(first.compute_2543_transaction_hash().unwrap(), id.as_str());
    }

    #[test]
    fn ack_matches_its_invite() {
        let mut invite = parse(LEGACY_INVITE);
        let mut ack = parse(LEGACY_ACK);
        assert_eq!(invite.transaction_id().unwrap(), ack.transaction_id().unwrap());
    }

    #[test]
    fn ack_and_cancel_match_a_re_invite() {
        let re_invite = LEGACY_INVITE.replace("To: Bob <sip:bob@biloxi.com>", "To: Bob <sip:bob@biloxi.com>;tag=a6c85cf");
        let mut invite = parse(&re_invite);
        let mut ack = parse(LEGACY_ACK);
        let mut cancel = parse(&re_invite.replace("INVITE", "CANCEL"));

        let id = invite.transaction_id().unwrap().clone();
        assert_eq!(ack.transaction_id().unwrap(), &id);
        assert_eq!(cancel.transaction_id().unwrap(), &id);
        assert_eq!(parse(LEGACY_INVITE).transaction_id().unwrap(), &id);
    }

    #[test]
    fn to_tag_scopes_other_requests() {
        let bye = LEGACY_INVITE.replace("INVITE", "BYE");
        let mut first = parse(&bye.replace("To: Bob <sip:bob@biloxi.com>", "To: Bob <sip:bob@biloxi.com>;tag=1"));
        let mut second = parse(&bye.replace("To: Bob <sip:bob@biloxi.com>", "To: Bob <sip:bob@biloxi.com>;tag=2"));
        let mut invite = parse(LEGACY_INVITE);

        let id = first.transaction_id().unwrap().clone();
        assert_ne!(second.transaction_id().unwrap(), &id);
        assert_ne!(invite.transaction_id().unwrap(), &id);
    }

    #[test]
    fn response_takes_its_branch_as_is() {
        let response = LEGACY_INVITE.replace("INVITE sip:bob@biloxi.com SIP/2.0", "SIP/2.0 200 OK");
        let mut message = parse(&response.replace("pc33.atlanta.com:5060", "pc33.atlanta.com:5060;branch=1234"));
        assert_eq!(message.transaction_id().unwrap(), &TransactionId::Branch("1234".to_string()));

        let mut message = parse(&response);
        assert!(matches!(message.transaction_id(), Err(SipError::Contract { source: ContractError::NotARequest })));
        assert!(message.compute_2543_transaction_hash().is_err());
    }

    #[test]
    fn bare_cookie_is_not_a_branch() {
        let mut message = parse(LEGACY_INVITE);
        message.headers::<h::Vias>().unwrap()[0].params_mut().set("branch", Some(BRANCH_MAGIC_COOKIE.to_string()));
        assert!(message.transaction_id().unwrap().is_legacy());
    }

    #[test]
    fn hash_depends_on_call_id() {
        let mut first = parse(LEGACY_INVITE);
        let mut second = parse(&LEGACY_INVITE.replace("a84b4c76e66710", "b84b4c76e66710"));
        assert_ne!(first.transaction_id().unwrap(), second.transaction_id().unwrap());
    }

    #[test]
    fn branch_without_cookie_falls_back_to_hash() {
        let mut message = parse(LEGACY_INVITE);
        message.headers::<h::Vias>().unwrap()[0].params_mut().set("branch", Some("1234".to_string()));
        assert!(message.transaction_id().unwrap().is_legacy());
    }

    #[test]
    fn resolved_id_never_changes() {
        let mut message = parse(LEGACY_INVITE);
        let id = message.transaction_id().unwrap().clone();

        message.header::<h::CSeq>().unwrap().set_sequence(1);
        message.set_rfc2543_transaction_id("forced");

        assert_eq!(message.transaction_id().unwrap(), &id);
        assert_eq!(message.rfc2543_transaction_id().unwrap(), "forced");
    }

    #[test]
    fn computed_legacy_id_does_not_shadow_branch() {
        let mut message = parse(LEGACY_INVITE);
        message.headers::<h::Vias>().unwrap()[0].params_mut().set("branch", Some("z9hG4bKabc".to_string()));

        assert_eq!(message.rfc2543_transaction_id().unwrap().len(), 32);
        assert_eq!(message.transaction_id().unwrap(), &TransactionId::Branch("z9hG4bKabc".to_string()));
    }

    #[test]
    fn forced_legacy_id_wins() {
        let mut message = parse(LEGACY_INVITE);
        message.set_rfc2543_transaction_id("restored-id");
        assert_eq!(message.transaction_id().unwrap(), &TransactionId::LegacyHash("restored-id".to_string()));
    }

    #[test]
    fn invalid_message_has_no_id() {
        let mut message = parse(LEGACY_INVITE);
        message.mark_invalid("content-length mismatch");

        assert!(matches!(message.transaction_id(), Err(SipError::InvalidMessage { .. })));
        assert!(message.compute_2543_transaction_hash().is_err());
    }

    #[test]
    fn missing_via_is_a_contract_error() {
        let mut message = parse(LEGACY_INVITE);
        message.remove(crate::protocol::HeaderType::Via);
        assert!(matches!(message.transaction_id(), Err(SipError::Contract { .. })));
    }

    #[test]
    fn through_the_trait() {
        let message = parse(LEGACY_INVITE);
        let mut boxed: Box<dyn TransactionMessage> = message.clone_message();

        assert!(!boxed.is_client_transaction());
        assert!(boxed.transaction_id().unwrap().is_legacy());
        assert!(boxed.brief().starts_with("SipReq: INVITE"));
        assert_eq!(boxed.encode().unwrap(), message.encode().unwrap());
    }
}
