//! Cached login credential.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keys;
use crate::signer::{KeySigner, Signer};

/// The active user's identity plus, for private-key logins, the secret key.
///
/// Watch-only credentials (no secret) model delegated signing: the identity
/// is known but signatures must come from a [`Signer`] the embedder
/// provides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    /// Hex x-only public key.
    pub pubkey: String,
    /// Bech32 npub of the same key.
    pub npub: String,
    /// Hex secret key; absent for watch-only credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Credential {
    /// Build a credential from a secret key (nsec or hex).
    pub fn from_secret(input: &str) -> Result<Self> {
        let secret = keys::parse_secret_key(input)?;
        let pubkey = keys::derive_pubkey(&secret)?;
        let npub = keys::encode_npub(&pubkey)?;
        Ok(Self {
            pubkey,
            npub,
            secret: Some(secret),
        })
    }

    /// Build a watch-only credential from a public identity.
    pub fn watch_only(input: &str) -> Result<Self> {
        let id = keys::Identity::parse(input)?;
        Ok(Self {
            pubkey: id.hex,
            npub: id.npub,
            secret: None,
        })
    }

    /// Whether this credential can sign locally.
    pub fn can_sign(&self) -> bool {
        self.secret.is_some()
    }

    /// Signing strategies for this credential, in preference order.
    ///
    /// Watch-only credentials yield an empty list; signing then fails with
    /// a descriptive error unless the caller appends a delegated signer.
    pub fn signers(&self) -> Result<Vec<Box<dyn Signer>>> {
        match &self.secret {
            Some(secret) => Ok(vec![Box::new(KeySigner::from_secret_hex(secret)?)]),
            None => Ok(vec![]),
        }
    }

    /// The nsec form of the stored secret, if any.
    pub fn nsec(&self) -> Option<String> {
        self.secret
            .as_deref()
            .and_then(|s| keys::encode_nsec(s).ok())
    }
}

/// Path of the credential file under `state_dir`.
fn credential_path(state_dir: &Path) -> PathBuf {
    state_dir.join("credential.json")
}

/// Persist a credential to the state directory.
///
/// Only key-backed credentials are written: a watch-only credential has no
/// secret to restore, so persisting it is a no-op.
pub fn save(state_dir: &Path, cred: &Credential) -> Result<()> {
    if !cred.can_sign() {
        return Ok(());
    }
    fs::create_dir_all(state_dir)?;
    let tmp = tempfile::NamedTempFile::new_in(state_dir)?;
    serde_json::to_writer(&tmp, cred)?;
    tmp.persist(credential_path(state_dir))
        .map_err(|e| Error::Credential(e.error))?;
    Ok(())
}

/// Load the cached credential, if any.
pub fn load(state_dir: &Path) -> Result<Option<Credential>> {
    let path = credential_path(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// Remove the cached credential. Returns whether one existed.
pub fn delete(state_dir: &Path) -> Result<bool> {
    let path = credential_path(state_dir);
    if path.exists() {
        fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SK: &str = "0000000000000000000000000000000000000000000000000000000000000002";

    #[test]
    fn from_secret_derives_identity() {
        let cred = Credential::from_secret(SK).unwrap();
        assert_eq!(cred.pubkey, keys::derive_pubkey(SK).unwrap());
        assert!(cred.npub.starts_with("npub1"));
        assert!(cred.can_sign());
        assert_eq!(cred.signers().unwrap().len(), 1);
        // accepts the nsec form too
        let via_nsec = Credential::from_secret(&cred.nsec().unwrap()).unwrap();
        assert_eq!(via_nsec, cred);
    }

    #[test]
    fn watch_only_cannot_sign() {
        let cred = Credential::watch_only(&keys::derive_pubkey(SK).unwrap()).unwrap();
        assert!(!cred.can_sign());
        assert!(cred.signers().unwrap().is_empty());
        assert!(cred.nsec().is_none());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let cred = Credential::from_secret(SK).unwrap();
        save(dir.path(), &cred).unwrap();
        let loaded = load(dir.path()).unwrap().unwrap();
        assert_eq!(loaded, cred);
    }

    #[test]
    fn watch_only_is_not_persisted() {
        let dir = TempDir::new().unwrap();
        let cred = Credential::watch_only(&keys::derive_pubkey(SK).unwrap()).unwrap();
        save(dir.path(), &cred).unwrap();
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn delete_reports_presence() {
        let dir = TempDir::new().unwrap();
        assert!(!delete(dir.path()).unwrap());
        let cred = Credential::from_secret(SK).unwrap();
        save(dir.path(), &cred).unwrap();
        assert!(delete(dir.path()).unwrap());
        assert!(load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn load_missing_dir_is_none() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("absent");
        assert!(load(&nested).unwrap().is_none());
    }

    #[test]
    fn serialized_form_omits_absent_secret() {
        let cred = Credential::watch_only(&keys::derive_pubkey(SK).unwrap()).unwrap();
        let json = serde_json::to_string(&cred).unwrap();
        assert!(!json.contains("secret"));
    }
}
