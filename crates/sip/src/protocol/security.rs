/// How strongly the sender identity was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityStrength {
    #[default]
    From,
    FailedIdentity,
    Identity,
}

/// Outcome of checking a signed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureStatus {
    #[default]
    None,
    Bad,
    Trusted,
    CaTrusted,
    NotTrusted,
    SelfSigned,
}

/// Identity and encryption facts attached to a received message, usually by
/// the TLS layer or the identity checker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurityAttributes {
    identity: Option<String>,
    strength: IdentityStrength,
    signature: SignatureStatus,
    signer: Option<String>,
    encrypted: bool,
}

impl SecurityAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity<S: Into<String>>(mut self, identity: S, strength: IdentityStrength) -> Self {
        self.identity = Some(identity.into());
        self.strength = strength;
        self
    }

    pub fn with_signature<S: Into<String>>(mut self, signer: S, status: SignatureStatus) -> Self {
        self.signer = Some(signer.into());
        self.signature = status;
        self
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn identity_strength(&self) -> IdentityStrength {
        self.strength
    }

    pub fn signer(&self) -> Option<&str> {
        self.signer.as_deref()
    }

    pub fn signature_status(&self) -> SignatureStatus {
        self.signature
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }
}
