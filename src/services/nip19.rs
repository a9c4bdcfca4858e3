//! NIP-19 `nevent` encoding for human-facing source links

use bech32::{Bech32, Hrp};
use log::warn;

#[derive(Debug)]
pub enum Nip19Error {
    InvalidId(String),
    Encode(String),
}

impl std::fmt::Display for Nip19Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Nip19Error::InvalidId(s) => write!(f, "invalid event id: {}", s),
            Nip19Error::Encode(s) => write!(f, "bech32 encoding failed: {}", s),
        }
    }
}

impl std::error::Error for Nip19Error {}

/// Encode an event id plus author and relay hints as a bech32 `nevent`
/// reference. TLV layout: type 0 = 32-byte id, type 1 = relay url,
/// type 2 = 32-byte author pubkey.
pub fn encode_nevent(
    id_hex: &str,
    author_hex: &str,
    relays: &[String],
) -> Result<String, Nip19Error> {
    let id = hex::decode(id_hex).map_err(|e| Nip19Error::InvalidId(e.to_string()))?;
    if id.len() != 32 {
        return Err(Nip19Error::InvalidId(format!(
            "expected 32 bytes, got {}",
            id.len()
        )));
    }

    let mut data = Vec::with_capacity(96);
    data.push(0u8);
    data.push(32);
    data.extend_from_slice(&id);

    // At most two relay hints keeps the reference a usable length
    for relay in relays.iter().take(2) {
        let bytes = relay.as_bytes();
        if bytes.is_empty() || bytes.len() > 255 {
            continue;
        }
        data.push(1);
        data.push(bytes.len() as u8);
        data.extend_from_slice(bytes);
    }

    if let Ok(author) = hex::decode(author_hex) {
        if author.len() == 32 {
            data.push(2);
            data.push(32);
            data.extend_from_slice(&author);
        }
    }

    let hrp = Hrp::parse("nevent").map_err(|e| Nip19Error::Encode(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, &data).map_err(|e| Nip19Error::Encode(e.to_string()))
}

/// Human-facing link to a source note. Falls back to a plain hex reference
/// when encoding is impossible rather than dropping the attribution.
pub fn event_reference(id_hex: &str, author_hex: &str, relays: &[String]) -> String {
    match encode_nevent(id_hex, author_hex, relays) {
        Ok(nevent) => format!("https://njump.me/{}", nevent),
        Err(e) => {
            warn!("nevent encoding failed for {}: {}", id_hex, e);
            format!("nostr event {}", id_hex)
        }
    }
}
