use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::header::encode_message;
use crate::protocol::{EncodeError, SipMessage};

/// An [`Encoder`] writing the full wire form of each [`SipMessage`].
///
/// Outbound decorators are not run here; the transport calls
/// [`SipMessage::call_outbound_decorators`] before handing the message over.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageEncoder;

impl MessageEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Encoder<&SipMessage> for MessageEncoder {
    type Error = EncodeError;

    fn encode(&mut self, item: &SipMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        encode_message(item, dst).inspect_err(|_| dst.truncate(start))?;
        trace!(size = dst.len() - start, "encoded sip message");
        Ok(())
    }
}

impl Encoder<SipMessage> for MessageEncoder {
    type Error = EncodeError;

    fn encode(&mut self, item: SipMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<&SipMessage>::encode(self, &item, dst)
    }
}
