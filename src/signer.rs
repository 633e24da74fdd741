//! Signing strategies for review events.

use secp256k1::{Keypair, Message, Secp256k1};

use crate::error::{Error, Result};
use crate::event::{self, Event, UnsignedEvent};

/// A strategy able to turn an unsigned event into a signed wire event.
///
/// Strategies are tried in a fixed preference order; `available` lets a
/// strategy opt out before being asked to sign. Embedders can provide
/// delegated signers (hardware, remote, or extension-backed) through this
/// trait alongside the built-in [`KeySigner`].
pub trait Signer: Send + Sync {
    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this strategy can currently sign.
    fn available(&self) -> bool;

    /// Hex public key the strategy signs as.
    fn pubkey(&self) -> String;

    /// Produce the signed wire event.
    fn sign(&self, unsigned: &UnsignedEvent) -> Result<Event>;
}

/// Local private-key signer: Schnorr over the canonical event hash.
pub struct KeySigner {
    keypair: Keypair,
    pubkey: String,
}

impl KeySigner {
    /// Build from a 32-byte hex secret key.
    pub fn from_secret_hex(seckey_hex: &str) -> Result<Self> {
        let bytes = hex::decode(seckey_hex)
            .map_err(|_| Error::InvalidKey("secret key is not hex".into()))?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, &bytes)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        let pubkey = hex::encode(keypair.x_only_public_key().0.serialize());
        Ok(Self { keypair, pubkey })
    }
}

impl Signer for KeySigner {
    fn name(&self) -> &'static str {
        "local-key"
    }

    fn available(&self) -> bool {
        true
    }

    fn pubkey(&self) -> String {
        self.pubkey.clone()
    }

    fn sign(&self, unsigned: &UnsignedEvent) -> Result<Event> {
        let hash = event::event_hash(unsigned).map_err(|e| Error::Signing(e.to_string()))?;
        let msg =
            Message::from_digest_slice(&hash).map_err(|e| Error::Signing(e.to_string()))?;
        let secp = Secp256k1::new();
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        Ok(unsigned
            .clone()
            .into_event(hex::encode(hash), hex::encode(sig.as_ref())))
    }
}

/// Sign with the first strategy that is available and succeeds.
///
/// Unavailable strategies are skipped; when every strategy is skipped or
/// fails, the operation is fatal and the error lists each attempt.
pub fn sign_with(strategies: &[Box<dyn Signer>], unsigned: &UnsignedEvent) -> Result<Event> {
    let mut attempts = Vec::new();
    for strategy in strategies {
        if !strategy.available() {
            attempts.push(format!("{}: unavailable", strategy.name()));
            continue;
        }
        match strategy.sign(unsigned) {
            Ok(ev) => return Ok(ev),
            Err(e) => attempts.push(format!("{}: {e}", strategy.name())),
        }
    }
    if attempts.is_empty() {
        attempts.push("no signing strategy configured".into());
    }
    Err(Error::Signing(attempts.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review;

    const SK: &str = "0000000000000000000000000000000000000000000000000000000000000003";

    struct Unavailable;

    impl Signer for Unavailable {
        fn name(&self) -> &'static str {
            "unavailable"
        }
        fn available(&self) -> bool {
            false
        }
        fn pubkey(&self) -> String {
            String::new()
        }
        fn sign(&self, _unsigned: &UnsignedEvent) -> Result<Event> {
            panic!("must not be called");
        }
    }

    struct Failing;

    impl Signer for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn available(&self) -> bool {
            true
        }
        fn pubkey(&self) -> String {
            String::new()
        }
        fn sign(&self, _unsigned: &UnsignedEvent) -> Result<Event> {
            Err(Error::Signing("device not connected".into()))
        }
    }

    fn unsigned() -> UnsignedEvent {
        let signer = KeySigner::from_secret_hex(SK).unwrap();
        review::build_unsigned(&"ab".repeat(32), 5, "great", &signer.pubkey())
    }

    #[test]
    fn key_signer_produces_verifiable_event() {
        let signer = KeySigner::from_secret_hex(SK).unwrap();
        let ev = signer.sign(&unsigned()).unwrap();
        event::verify_event(&ev).unwrap();
        assert_eq!(ev.pubkey, signer.pubkey());
        assert_eq!(
            ev.id,
            hex::encode(event::event_hash(&ev.unsigned()).unwrap())
        );
    }

    #[test]
    fn key_signer_rejects_bad_secrets() {
        assert!(KeySigner::from_secret_hex("nothex").is_err());
        assert!(KeySigner::from_secret_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn first_available_strategy_wins() {
        let strategies: Vec<Box<dyn Signer>> = vec![
            Box::new(Unavailable),
            Box::new(KeySigner::from_secret_hex(SK).unwrap()),
        ];
        let ev = sign_with(&strategies, &unsigned()).unwrap();
        event::verify_event(&ev).unwrap();
    }

    #[test]
    fn all_strategies_failing_is_fatal_with_detail() {
        let strategies: Vec<Box<dyn Signer>> = vec![Box::new(Unavailable), Box::new(Failing)];
        let err = sign_with(&strategies, &unsigned()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unavailable: unavailable"));
        assert!(msg.contains("failing: device not connected"));
    }

    #[test]
    fn empty_strategy_list_is_fatal() {
        let err = sign_with(&[], &unsigned()).unwrap_err();
        assert!(err.to_string().contains("no signing strategy configured"));
    }

    #[test]
    fn failing_strategy_falls_through_to_next() {
        let strategies: Vec<Box<dyn Signer>> = vec![
            Box::new(Failing),
            Box::new(KeySigner::from_secret_hex(SK).unwrap()),
        ];
        let ev = sign_with(&strategies, &unsigned()).unwrap();
        event::verify_event(&ev).unwrap();
    }
}
