//! Nostr event model and canonical hashing.

use anyhow::{anyhow, Result};
use secp256k1::{schnorr::Signature, Message, Secp256k1, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind number for profile-metadata events.
pub const PROFILE_KIND: u32 = 0;
/// Kind number for NIP-32 label events carrying reviews.
pub const REVIEW_KIND: u32 = 1985;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// Tags appear as small arrays where the first element denotes the type and
/// the following elements hold data. Review events rely on:
///
/// - `L` – namespace label
/// - `l` – type label within the namespace
/// - `p` – the reviewed identity's public key
/// - `rating` – the 1-5 score
///
/// Each tag is stored verbatim so informational tags (`client`, `t`, `alt`)
/// are preserved even though they play no part in validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

/// Signed event as it appears on the wire.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "3bf0c6...",
///   "kind": 1985,
///   "created_at": 1700000000,
///   "tags": [["L", "thunderproof"], ["p", "deadbeef..."]],
///   "content": "great service",
///   "sig": "deadbeef"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 hash).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `0` or `1985`.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Tag collection, classification and informational tags alike.
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

/// Event awaiting an identifier and signature.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnsignedEvent {
    /// Author public key (hex).
    pub pubkey: String,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Kind number.
    pub kind: u32,
    /// Tag collection.
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
}

impl UnsignedEvent {
    /// Attach an identifier and signature, producing the wire event.
    pub fn into_event(self, id: String, sig: String) -> Event {
        Event {
            id,
            pubkey: self.pubkey,
            kind: self.kind,
            created_at: self.created_at,
            tags: self.tags,
            content: self.content,
            sig,
        }
    }
}

impl Event {
    /// View of the signable fields, for re-hashing a received event.
    pub fn unsigned(&self) -> UnsignedEvent {
        UnsignedEvent {
            pubkey: self.pubkey.clone(),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
        }
    }
}

/// Compute the canonical event hash from the signable fields.
///
/// The digest is SHA-256 over the JSON serialization of the fixed 6-tuple
/// `[0, pubkey, created_at, kind, tags, content]`; its hex encoding is the
/// event identifier.
pub fn event_hash(ev: &UnsignedEvent) -> Result<[u8; 32]> {
    let arr = serde_json::json!([0, ev.pubkey, ev.created_at, ev.kind, ev.tags, ev.content]);
    let data = serde_json::to_vec(&arr)?;
    let hash = Sha256::digest(&data);
    Ok(hash.into())
}

/// Verify an event's identifier and Schnorr signature.
pub fn verify_event(ev: &Event) -> Result<()> {
    let hash = event_hash(&ev.unsigned())?;
    let calc_id = hex::encode(hash);
    if calc_id != ev.id {
        return Err(anyhow!("id mismatch"));
    }
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    let pk = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest_slice(&hash)?;
    secp.verify_schnorr(&sig, &msg, &pk)?;
    Ok(())
}
