//! Identity codec: bech32 npub/nsec forms and hex public keys.

use bech32::{Bech32, Hrp};
use secp256k1::{Keypair, Secp256k1};

use crate::error::{Error, Result};

/// A public identity on the network.
///
/// Holds both the raw hex form used on the wire and the bech32 `npub` form
/// shown to people.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    /// 64-character hex x-only public key.
    pub hex: String,
    /// Bech32 `npub` encoding of the same key.
    pub npub: String,
}

impl Identity {
    /// Parse an identity from its npub or 64-character hex form.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        if raw.starts_with("npub1") {
            let bytes = decode_bech32("npub", raw)
                .ok_or_else(|| Error::InvalidIdentity(raw.to_string()))?;
            if bytes.len() != 32 {
                return Err(Error::InvalidIdentity(raw.to_string()));
            }
            return Ok(Self {
                hex: hex::encode(bytes),
                npub: raw.to_ascii_lowercase(),
            });
        }
        if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
            let hex = raw.to_ascii_lowercase();
            let npub = encode_npub(&hex)?;
            return Ok(Self { hex, npub });
        }
        Err(Error::InvalidIdentity(raw.to_string()))
    }
}

/// Encode a 32-byte hex public key as an npub.
pub fn encode_npub(pubkey_hex: &str) -> Result<String> {
    encode_bech32("npub", pubkey_hex)
        .ok_or_else(|| Error::InvalidIdentity(pubkey_hex.to_string()))
}

/// Encode a 32-byte hex secret key as an nsec.
pub fn encode_nsec(seckey_hex: &str) -> Result<String> {
    encode_bech32("nsec", seckey_hex)
        .ok_or_else(|| Error::InvalidKey("secret key is not valid 32-byte hex".into()))
}

/// Parse a secret key from its nsec or 64-character hex form.
pub fn parse_secret_key(input: &str) -> Result<String> {
    let raw = input.trim();
    if raw.starts_with("nsec1") {
        let bytes = decode_bech32("nsec", raw)
            .filter(|b| b.len() == 32)
            .ok_or_else(|| Error::InvalidKey("malformed nsec".into()))?;
        return Ok(hex::encode(bytes));
    }
    if raw.len() == 64 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(raw.to_ascii_lowercase());
    }
    Err(Error::InvalidKey(
        "expected an nsec or 64-character hex secret key".into(),
    ))
}

/// Derive the x-only public key hex for a secret key hex.
pub fn derive_pubkey(seckey_hex: &str) -> Result<String> {
    let bytes =
        hex::decode(seckey_hex).map_err(|_| Error::InvalidKey("secret key is not hex".into()))?;
    let secp = Secp256k1::new();
    let kp = Keypair::from_seckey_slice(&secp, &bytes)
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    Ok(hex::encode(kp.x_only_public_key().0.serialize()))
}

/// Shorten an npub for display.
pub fn truncate_npub(npub: &str) -> String {
    if npub.len() > 20 {
        format!("{}...", &npub[..20])
    } else {
        npub.to_string()
    }
}

fn encode_bech32(hrp: &str, hex_data: &str) -> Option<String> {
    let bytes = hex::decode(hex_data).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    let hrp = Hrp::parse(hrp).ok()?;
    bech32::encode::<Bech32>(hrp, &bytes).ok()
}

fn decode_bech32(expected_hrp: &str, s: &str) -> Option<Vec<u8>> {
    let (hrp, data) = bech32::decode(s).ok()?;
    if hrp.as_str() != expected_hrp {
        return None;
    }
    Some(data)
}
