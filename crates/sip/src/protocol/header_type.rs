//! The dictionary of headers the message knows by type.
//!
//! Every known header has a [`HeaderType`] (the slot index), a canonical
//! name, an optional compact form, a cardinality and a value type. The access
//! tokens in [`h`] tie those together at compile time, so that
//! `message.header::<h::CSeq>()` yields a `&mut CSeq` while
//! `message.headers::<h::Vias>()` yields a container of `Via` values.
//!
//! The declaration order is also the order known headers are encoded in.

use crate::grammar::HeaderValue;
use crate::protocol::raw::BufferArena;
use crate::protocol::slot::HeaderSlot;
use crate::protocol::HeaderParseError;

/// Binds an access token to its slot and value type.
pub trait HeaderToken {
    type Value: HeaderValue;
    const TYPE: HeaderType;
}

/// Headers that carry exactly one value, e.g. `CSeq`.
pub trait SingleHeader: HeaderToken {}

/// Headers that may carry any number of values, e.g. `Via`.
pub trait MultiHeader: HeaderToken {}

macro_rules! define_headers {
    (@multi SingleHeader) => { false };
    (@multi MultiHeader) => { true };
    (@compact) => { None };
    (@compact $compact:literal) => { Some($compact) };

    ($(
        $variant:ident => $name:literal $([$compact:literal])?,
        $token:ident: $value:ty, $cardinality:ident, comma: $comma:literal;
    )*) => {
        /// Known header kinds, one slot each.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum HeaderType {
            $( $variant, )*
        }

        impl HeaderType {
            /// All known headers in declaration order.
            pub const ALL: &'static [HeaderType] = &[ $( HeaderType::$variant, )* ];

            pub const COUNT: usize = Self::ALL.len();

            /// The canonical header name, e.g. `Call-ID`.
            pub fn name(self) -> &'static str {
                match self {
                    $( HeaderType::$variant => $name, )*
                }
            }

            /// The RFC 3261 compact form, e.g. `i` for `Call-ID`.
            pub fn compact_name(self) -> Option<char> {
                match self {
                    $( HeaderType::$variant => define_headers!(@compact $($compact)?), )*
                }
            }

            /// True when the header may carry more than one value.
            pub fn is_multi(self) -> bool {
                match self {
                    $( HeaderType::$variant => define_headers!(@multi $cardinality), )*
                }
            }

            /// True when one header line may carry several comma separated values.
            pub fn is_comma_list(self) -> bool {
                match self {
                    $( HeaderType::$variant => $comma, )*
                }
            }

            /// Promotes `slot` with the value type bound to this header.
            pub(crate) fn promote(self, slot: &mut HeaderSlot, arena: &BufferArena) -> Result<(), HeaderParseError> {
                match self {
                    $( HeaderType::$variant => slot.promote::<$value>(arena, $name, $comma).map(|_| ()), )*
                }
            }
        }

        /// Typed access tokens, named after the header and pluralized when
        /// the header is multi-valued.
        pub mod h {
            $(
                #[doc = concat!("Access token for the `", $name, "` header.")]
                #[derive(Debug, Clone, Copy)]
                pub struct $token;

                impl super::HeaderToken for $token {
                    type Value = $value;
                    const TYPE: super::HeaderType = super::HeaderType::$variant;
                }

                impl super::$cardinality for $token {}
            )*
        }
    };
}

define_headers! {
    Via => "Via" ['v'], Vias: crate::grammar::Via, MultiHeader, comma: true;
    Route => "Route", Routes: crate::grammar::NameAddr, MultiHeader, comma: true;
    RecordRoute => "Record-Route", RecordRoutes: crate::grammar::NameAddr, MultiHeader, comma: true;
    Path => "Path", Paths: crate::grammar::NameAddr, MultiHeader, comma: true;
    ServiceRoute => "Service-Route", ServiceRoutes: crate::grammar::NameAddr, MultiHeader, comma: true;
    MaxForwards => "Max-Forwards", MaxForwards: crate::grammar::IntegerCategory, SingleHeader, comma: false;
    From => "From" ['f'], From: crate::grammar::NameAddr, SingleHeader, comma: false;
    To => "To" ['t'], To: crate::grammar::NameAddr, SingleHeader, comma: false;
    CallId => "Call-ID" ['i'], CallId: crate::grammar::CallId, SingleHeader, comma: false;
    CSeq => "CSeq", CSeq: crate::grammar::CSeq, SingleHeader, comma: false;
    Contact => "Contact" ['m'], Contacts: crate::grammar::NameAddr, MultiHeader, comma: true;
    Expires => "Expires", Expires: crate::grammar::IntegerCategory, SingleHeader, comma: false;
    MinExpires => "Min-Expires", MinExpires: crate::grammar::IntegerCategory, SingleHeader, comma: false;
    Allow => "Allow", Allows: crate::grammar::Token, MultiHeader, comma: true;
    Supported => "Supported" ['k'], Supporteds: crate::grammar::Token, MultiHeader, comma: true;
    Require => "Require", Requires: crate::grammar::Token, MultiHeader, comma: true;
    ProxyRequire => "Proxy-Require", ProxyRequires: crate::grammar::Token, MultiHeader, comma: true;
    Unsupported => "Unsupported", Unsupporteds: crate::grammar::Token, MultiHeader, comma: true;
    Event => "Event" ['o'], Event: crate::grammar::Token, SingleHeader, comma: false;
    AllowEvents => "Allow-Events" ['u'], AllowEvents: crate::grammar::Token, MultiHeader, comma: true;
    SubscriptionState => "Subscription-State", SubscriptionState: crate::grammar::Token, SingleHeader, comma: false;
    ReferTo => "Refer-To" ['r'], ReferTo: crate::grammar::NameAddr, SingleHeader, comma: false;
    ReferredBy => "Referred-By" ['b'], ReferredBy: crate::grammar::NameAddr, SingleHeader, comma: false;
    ReplyTo => "Reply-To", ReplyTo: crate::grammar::NameAddr, SingleHeader, comma: false;
    PAssertedIdentity => "P-Asserted-Identity", PAssertedIdentities: crate::grammar::NameAddr, MultiHeader, comma: true;
    Authorization => "Authorization", Authorizations: crate::grammar::StringCategory, MultiHeader, comma: false;
    ProxyAuthorization => "Proxy-Authorization", ProxyAuthorizations: crate::grammar::StringCategory, MultiHeader, comma: false;
    WwwAuthenticate => "WWW-Authenticate", WwwAuthenticates: crate::grammar::StringCategory, MultiHeader, comma: false;
    ProxyAuthenticate => "Proxy-Authenticate", ProxyAuthenticates: crate::grammar::StringCategory, MultiHeader, comma: false;
    AuthenticationInfo => "Authentication-Info", AuthenticationInfo: crate::grammar::StringCategory, SingleHeader, comma: false;
    Accept => "Accept", Accepts: crate::grammar::MimeCategory, MultiHeader, comma: true;
    AcceptEncoding => "Accept-Encoding", AcceptEncodings: crate::grammar::Token, MultiHeader, comma: true;
    AcceptLanguage => "Accept-Language", AcceptLanguages: crate::grammar::Token, MultiHeader, comma: true;
    AlertInfo => "Alert-Info", AlertInfos: crate::grammar::NameAddr, MultiHeader, comma: true;
    CallInfo => "Call-Info", CallInfos: crate::grammar::NameAddr, MultiHeader, comma: true;
    ErrorInfo => "Error-Info", ErrorInfos: crate::grammar::NameAddr, MultiHeader, comma: true;
    InReplyTo => "In-Reply-To", InReplyTos: crate::grammar::StringCategory, MultiHeader, comma: true;
    Warning => "Warning", Warnings: crate::grammar::StringCategory, MultiHeader, comma: true;
    Date => "Date", Date: crate::grammar::StringCategory, SingleHeader, comma: false;
    Timestamp => "Timestamp", Timestamp: crate::grammar::StringCategory, SingleHeader, comma: false;
    RetryAfter => "Retry-After", RetryAfter: crate::grammar::IntegerCategory, SingleHeader, comma: false;
    Priority => "Priority", Priority: crate::grammar::Token, SingleHeader, comma: false;
    Organization => "Organization", Organization: crate::grammar::StringCategory, SingleHeader, comma: false;
    Subject => "Subject" ['s'], Subject: crate::grammar::StringCategory, SingleHeader, comma: false;
    UserAgent => "User-Agent", UserAgent: crate::grammar::StringCategory, SingleHeader, comma: false;
    Server => "Server", Server: crate::grammar::StringCategory, SingleHeader, comma: false;
    RSeq => "RSeq", RSeq: crate::grammar::IntegerCategory, SingleHeader, comma: false;
    RAck => "RAck", RAck: crate::grammar::StringCategory, SingleHeader, comma: false;
    SessionExpires => "Session-Expires" ['x'], SessionExpires: crate::grammar::IntegerCategory, SingleHeader, comma: false;
    MinSE => "Min-SE", MinSE: crate::grammar::IntegerCategory, SingleHeader, comma: false;
    Identity => "Identity" ['y'], Identity: crate::grammar::StringCategory, SingleHeader, comma: false;
    IdentityInfo => "Identity-Info" ['n'], IdentityInfo: crate::grammar::StringCategory, SingleHeader, comma: false;
    MimeVersion => "MIME-Version", MimeVersion: crate::grammar::Token, SingleHeader, comma: false;
    ContentDisposition => "Content-Disposition", ContentDisposition: crate::grammar::Token, SingleHeader, comma: false;
    ContentEncoding => "Content-Encoding" ['e'], ContentEncoding: crate::grammar::Token, SingleHeader, comma: false;
    ContentLanguage => "Content-Language", ContentLanguages: crate::grammar::Token, MultiHeader, comma: true;
    ContentType => "Content-Type" ['c'], ContentType: crate::grammar::MimeCategory, SingleHeader, comma: false;
    ContentLength => "Content-Length" ['l'], ContentLength: crate::grammar::IntegerCategory, SingleHeader, comma: false;
}

impl HeaderType {
    /// Looks a header name up, case-insensitively, accepting compact forms.
    pub fn from_name(name: &str) -> Option<HeaderType> {
        let name = name.trim();
        if let [single] = name.as_bytes() {
            let compact = single.to_ascii_lowercase() as char;
            return Self::ALL.iter().copied().find(|header_type| header_type.compact_name() == Some(compact));
        }
        Self::ALL.iter().copied().find(|header_type| header_type.name().eq_ignore_ascii_case(name))
    }

    /// Slot index inside the header store.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}
