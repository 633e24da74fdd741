//! Review event validation, construction, and ordering.

use std::cmp::Reverse;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::event::{self, Event, Tag, UnsignedEvent, REVIEW_KIND};
use crate::keys;

/// Namespace label identifying review events (NIP-32 `L` tag).
pub const REVIEW_NAMESPACE: &str = "thunderproof";

/// Signature handling mode for incoming review events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigCheck {
    /// Verify, rejecting events whose id or signature does not check out.
    Enforce,
    /// Accept events unverified, leaving the `verified` flag false.
    Skip,
}

/// A validated review about a target identity.
///
/// Never mutated after validation; the raw wire event is retained so the
/// signature can be re-checked later.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewEvent {
    /// Event identifier (content hash, globally unique).
    pub id: String,
    /// Author public key (hex).
    pub author: String,
    /// Author public key in npub form.
    pub author_npub: String,
    /// Reviewed identity (hex), from the `p` tag.
    pub target: String,
    /// Score in 1..=5, from the `rating` tag.
    pub rating: u8,
    /// Free-text comment.
    pub comment: String,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Schnorr signature carried by the event.
    pub sig: String,
    /// True when the signature was checked against the author key.
    pub verified: bool,
    /// Raw wire payload, kept for later re-verification.
    #[serde(skip)]
    pub raw: Event,
}

/// Validate a wire event as a review.
///
/// Returns `None` when the event misses any of the four classification
/// tags (namespace, type, target, rating), when the rating falls outside
/// 1..=5, or — with [`SigCheck::Enforce`] — when the signature fails.
pub fn validate(ev: &Event, check: SigCheck) -> Option<ReviewEvent> {
    if ev.id.is_empty() || ev.pubkey.is_empty() || ev.tags.is_empty() {
        return None;
    }

    let verified = match check {
        SigCheck::Enforce => {
            if let Err(e) = event::verify_event(ev) {
                tracing::debug!("dropping review {}: {e}", ev.id);
                return None;
            }
            true
        }
        SigCheck::Skip => false,
    };

    let rating_tag = find_tag(&ev.tags, |f| f[0] == "rating")?;
    let target_tag = find_tag(&ev.tags, |f| f[0] == "p")?;
    find_tag(&ev.tags, |f| f[0] == "L" && f[1] == REVIEW_NAMESPACE)?;
    find_tag(&ev.tags, |f| f[0] == "l" && f[1] == "review")?;

    let rating: u8 = rating_tag[1].parse().ok()?;
    if !(1..=5).contains(&rating) {
        return None;
    }

    let author_npub = keys::encode_npub(&ev.pubkey)
        .unwrap_or_else(|_| format!("{}...", &ev.pubkey[..ev.pubkey.len().min(8)]));

    Some(ReviewEvent {
        id: ev.id.clone(),
        author: ev.pubkey.clone(),
        author_npub,
        target: target_tag[1].clone(),
        rating,
        comment: ev.content.clone(),
        created_at: ev.created_at,
        sig: ev.sig.clone(),
        verified,
        raw: ev.clone(),
    })
}

/// First tag with at least two fields matching `pred`.
fn find_tag(tags: &[Tag], pred: impl Fn(&[String]) -> bool) -> Option<&[String]> {
    tags.iter()
        .map(|Tag(fields)| fields.as_slice())
        .find(|fields| fields.len() >= 2 && pred(fields))
}

/// Build the canonical unsigned review event.
///
/// Two builds with identical inputs differ only in `created_at`.
pub fn build_unsigned(target: &str, rating: u8, comment: &str, author_pubkey: &str) -> UnsignedEvent {
    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    UnsignedEvent {
        pubkey: author_pubkey.to_string(),
        created_at,
        kind: REVIEW_KIND,
        tags: vec![
            Tag(vec!["L".into(), REVIEW_NAMESPACE.into()]),
            Tag(vec!["l".into(), "review".into(), REVIEW_NAMESPACE.into()]),
            Tag(vec!["p".into(), target.to_string()]),
            Tag(vec!["rating".into(), rating.to_string()]),
            Tag(vec!["client".into(), "Thunderproof".into()]),
            Tag(vec!["t".into(), "review".into()]),
            Tag(vec!["alt".into(), format!("Review: {rating}/5 stars")]),
        ],
        content: comment.to_string(),
    }
}

/// Client-side orderings for a fetched review set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReviewSort {
    /// Most recent first (the default).
    Newest,
    /// Oldest first.
    Oldest,
    /// Highest rating first.
    Highest,
    /// Lowest rating first.
    Lowest,
}

/// Re-sort a review set in place.
pub fn sort(reviews: &mut [ReviewEvent], order: ReviewSort) {
    match order {
        ReviewSort::Newest => reviews.sort_by_key(|r| Reverse(r.created_at)),
        ReviewSort::Oldest => reviews.sort_by_key(|r| r.created_at),
        ReviewSort::Highest => reviews.sort_by_key(|r| Reverse(r.rating)),
        ReviewSort::Lowest => reviews.sort_by_key(|r| r.rating),
    }
}

/// Mean rating over a review set, `None` when empty.
pub fn average_rating(reviews: &[ReviewEvent]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
    Some(f64::from(sum) / reviews.len() as f64)
}
