//! Reads a capture of SIP messages sent back to back over a stream transport
//! and logs what each one carries.
//!
//! ```text
//! cargo run -p micro-sip --example dump_message -- capture.txt
//! ```

use futures::StreamExt;
use micro_sip::codec::MessageDecoder;
use micro_sip::protocol::{h, SipMessage};
use tokio::fs::File;
use tokio_util::codec::FramedRead;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::TRACE).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(path) = std::env::args().nth(1) else {
        error!("usage: dump_message <capture file>");
        return;
    };

    let file = match File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            error!(cause = %e, path, "open capture error");
            return;
        }
    };

    let mut messages = FramedRead::new(file, MessageDecoder::new());
    while let Some(result) = messages.next().await {
        match result {
            Ok(message) => dump(message),
            Err(e) => {
                error!(cause = %e, "framing error, stop reading");
                break;
            }
        }
    }
}

fn dump(mut message: SipMessage) {
    info!(brief = %message, "receive message");

    match message.transaction_id() {
        Ok(id) => info!(transaction_id = %id, legacy = id.is_legacy(), "transaction"),
        Err(e) => warn!(cause = %e, "no transaction id"),
    }

    if let Ok(call_id) = message.header::<h::CallId>() {
        info!(call_id = call_id.value(), "dialog");
    }

    match message.contents() {
        Ok(Some(contents)) => info!(content_type = %contents.content_type(), "body"),
        Ok(None) => {}
        Err(e) => warn!(cause = %e, "unreadable body"),
    }

    match message.encode() {
        Ok(bytes) => info!(size = bytes.len(), "re-encoded"),
        Err(e) => warn!(cause = %e, "can't re-encode"),
    }
}
