//! Fan-out query aggregation across the configured relay set.
//!
//! Every operation queries all relays in parallel and waits for each one to
//! settle — never first-to-respond, since a fast relay may hold stale data
//! while a slow one has the authoritative copy. Merging happens only after
//! the join, in configured relay order.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::{json, Value};

use crate::config::Settings;
use crate::event::{Event, PROFILE_KIND, REVIEW_KIND};
use crate::keys::Identity;
use crate::profile::ProfileRecord;
use crate::relay;
use crate::review::{self, ReviewEvent, ReviewSort, REVIEW_NAMESPACE};

/// Fetch the freshest profile-metadata record for `identity`.
///
/// Returns the decoded record for the newest event across all relays, or
/// the fallback defaults when no relay had one. Never fails.
pub async fn fetch_profile(cfg: &Settings, identity: &Identity) -> ProfileRecord {
    let filter = json!({
        "kinds": [PROFILE_KIND],
        "authors": [identity.hex],
        "limit": 1,
    });
    let events = query_all(cfg, &filter, cfg.timeout_profile).await;
    match events.into_iter().max_by_key(|ev| ev.created_at) {
        Some(ev) => ProfileRecord::decode(identity, &ev),
        None => {
            tracing::info!("no profile event found for {}", identity.npub);
            ProfileRecord::fallback(identity)
        }
    }
}

/// Fetch, deduplicate, validate, and sort all reviews about `target`.
///
/// Duplicates are dropped by event id with the first occurrence winning;
/// events failing review validation are discarded silently. The result is
/// sorted newest first.
pub async fn fetch_reviews(cfg: &Settings, target: &Identity) -> Vec<ReviewEvent> {
    let filter = json!({
        "kinds": [REVIEW_KIND],
        "#L": [REVIEW_NAMESPACE],
        "#l": ["review"],
        "#p": [target.hex],
        "limit": 100,
    });
    let merged = query_all(cfg, &filter, cfg.timeout_reviews).await;
    let fetched = merged.len();
    let deduped = dedupe_by_id(merged);
    let mut reviews: Vec<ReviewEvent> = deduped
        .iter()
        .filter_map(|ev| review::validate(ev, cfg.sig_check()))
        .collect();
    tracing::info!(
        "{} valid reviews out of {} fetched events for {}",
        reviews.len(),
        fetched,
        target.npub
    );
    review::sort(&mut reviews, ReviewSort::Newest);
    reviews
}

/// Query every relay in parallel and merge results in configured order.
async fn query_all(cfg: &Settings, filter: &Value, window: Duration) -> Vec<Event> {
    let tasks = cfg
        .relays
        .iter()
        .map(|r| relay::query_relay(r, filter, window, cfg.tor_socks.as_deref()));
    join_all(tasks).await.into_iter().flatten().collect()
}

/// Keep the first occurrence of each event id.
fn dedupe_by_id(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|ev| !ev.id.is_empty() && seen.insert(ev.id.clone()))
        .collect()
}
