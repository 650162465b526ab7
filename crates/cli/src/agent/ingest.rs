//! Ingest datagram framing
//!
//! Producers may prefix a datagram with `app:<id>\n` to tag it for per-app
//! consumers. The engine always forwards the datagram unchanged; only the
//! fan-out envelope is split.

use bytes::Bytes;
use contracts::{AppId, Envelope};

const APP_PREFIX: &[u8] = b"app:";

/// Build the fan-out envelope for one ingest datagram
pub fn envelope_from_datagram(datagram: &[u8]) -> Envelope {
    let Some(rest) = datagram.strip_prefix(APP_PREFIX) else {
        return Envelope::untagged(Bytes::copy_from_slice(datagram));
    };

    let Some(newline) = rest.iter().position(|&b| b == b'\n') else {
        return Envelope::untagged(Bytes::copy_from_slice(datagram));
    };

    match std::str::from_utf8(&rest[..newline]) {
        Ok(app_id) if !app_id.is_empty() => Envelope {
            app_id: Some(AppId::from(app_id)),
            payload: Bytes::copy_from_slice(&rest[newline + 1..]),
        },
        _ => Envelope::untagged(Bytes::copy_from_slice(datagram)),
    }
}
