//! Configuration loading from `.env` files.

use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result};

use crate::review::SigCheck;

/// Relays used when `RELAYS` is not configured.
pub const DEFAULT_RELAYS: &str = "wss://relay.damus.io,wss://nos.lol,wss://relay.snort.social";

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Relays queried and published to, in order.
    pub relays: Vec<String>,
    /// Directory holding the cached credential.
    pub state_dir: PathBuf,
    /// Enforce Schnorr signature verification on fetched reviews.
    pub verify_sig: bool,
    /// Window for profile queries.
    pub timeout_profile: Duration,
    /// Window for review queries.
    pub timeout_reviews: Duration,
    /// Window awaiting a publish acknowledgment.
    pub timeout_publish: Duration,
    /// Optional Tor SOCKS proxy (host:port).
    pub tor_socks: Option<String>,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let relays = csv_strings(env::var("RELAYS").unwrap_or_else(|_| DEFAULT_RELAYS.into()));
        let state_dir = PathBuf::from(env::var("STATE_DIR")?);
        let verify_sig = env::var("VERIFY_SIG").unwrap_or_else(|_| "1".into()) != "0";
        let timeout_profile = secs_var("TIMEOUT_PROFILE_SECS", 10);
        let timeout_reviews = secs_var("TIMEOUT_REVIEWS_SECS", 15);
        let timeout_publish = secs_var("TIMEOUT_PUBLISH_SECS", 10);
        let tor_socks = env::var("TOR_SOCKS").ok().filter(|s| !s.is_empty());
        Ok(Self {
            relays,
            state_dir,
            verify_sig,
            timeout_profile,
            timeout_reviews,
            timeout_publish,
            tor_socks,
        })
    }

    /// Signature handling mode derived from `VERIFY_SIG`.
    pub fn sig_check(&self) -> SigCheck {
        if self.verify_sig {
            SigCheck::Enforce
        } else {
            SigCheck::Skip
        }
    }
}

/// Read a duration in whole seconds, falling back on parse failure.
fn secs_var(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}

/// Split a comma-separated string into trimmed string values.
pub fn csv_strings(input: impl AsRef<str>) -> Vec<String> {
    let s = input.as_ref();
    s.split(',')
        .filter_map(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .collect()
}
