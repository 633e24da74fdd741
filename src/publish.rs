//! Review submission: build, sign, and broadcast across relays.

use futures_util::future::join_all;

use crate::config::Settings;
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::keys::Identity;
use crate::relay::{self, RelayOutcome};
use crate::review;
use crate::signer::{self, Signer};

/// Per-relay results of one publish operation.
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Identifier of the published event.
    pub event_id: String,
    /// Outcome per relay, in configured order.
    pub results: Vec<(String, RelayOutcome)>,
}

impl PublishReport {
    /// Number of relays that accepted the event.
    pub fn accepted_count(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, outcome)| outcome.is_accepted())
            .count()
    }

    /// A single acceptance is sufficient for overall success.
    pub fn succeeded(&self) -> bool {
        self.accepted_count() > 0
    }

    /// Every relay's outcome, concatenated for diagnostics.
    pub fn summary(&self) -> String {
        self.results
            .iter()
            .map(|(relay, outcome)| format!("{relay}: {outcome}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Build, sign, and publish a review about `target` with `credential`.
///
/// Rating and comment are re-checked here as invariants even though the
/// caller validates them first. Succeeds iff at least one relay accepts
/// the signed event; when none does, the error carries every relay's
/// failure reason.
pub async fn submit_review(
    cfg: &Settings,
    credential: &Credential,
    target: &Identity,
    rating: u8,
    comment: &str,
) -> Result<PublishReport> {
    let strategies = credential.signers()?;
    submit_with(cfg, &strategies, &credential.pubkey, target, rating, comment).await
}

/// As [`submit_review`], but with an explicit signing strategy list.
pub async fn submit_with(
    cfg: &Settings,
    strategies: &[Box<dyn Signer>],
    author_pubkey: &str,
    target: &Identity,
    rating: u8,
    comment: &str,
) -> Result<PublishReport> {
    if !(1..=5).contains(&rating) {
        return Err(Error::RatingOutOfRange(rating));
    }
    if comment.trim().is_empty() {
        return Err(Error::EmptyComment);
    }

    let unsigned = review::build_unsigned(&target.hex, rating, comment, author_pubkey);
    let signed = signer::sign_with(strategies, &unsigned)?;
    let report = broadcast(cfg, &signed).await;
    if report.succeeded() {
        tracing::info!(
            "review {} accepted by {}/{} relays",
            report.event_id,
            report.accepted_count(),
            report.results.len()
        );
        Ok(report)
    } else {
        Err(Error::PublishFailed(report.summary()))
    }
}

/// Fan the signed event out to every relay, waiting for all to settle.
pub async fn broadcast(cfg: &Settings, ev: &Event) -> PublishReport {
    let tasks = cfg.relays.iter().map(|r| async move {
        let outcome =
            relay::publish_relay(r, ev, cfg.timeout_publish, cfg.tor_socks.as_deref()).await;
        (r.clone(), outcome)
    });
    PublishReport {
        event_id: ev.id.clone(),
        results: join_all(tasks).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use crate::review::SigCheck;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio_tungstenite::{accept_async, tungstenite::Message as TMsg};

    const SK: &str = "0000000000000000000000000000000000000000000000000000000000000005";
    const TARGET_HEX: &str = "3bf0c63fcb93463407af97a5e5ee64fa883d107ef9e558472c4eb9aaaefa459d";

    fn settings(relays: Vec<String>) -> Settings {
        Settings {
            relays,
            state_dir: std::env::temp_dir(),
            verify_sig: true,
            timeout_profile: Duration::from_secs(2),
            timeout_reviews: Duration::from_secs(2),
            timeout_publish: Duration::from_millis(800),
            tor_socks: None,
        }
    }

    fn target() -> Identity {
        Identity::parse(TARGET_HEX).unwrap()
    }

    /// Mock relay that acknowledges the first EVENT frame.
    ///
    /// `accept` controls the OK flag; `check_sig` additionally verifies the
    /// received event before acknowledging.
    async fn mock_publish_relay(accept: bool, reason: &'static str, check_sig: bool) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            if let Some(Ok(TMsg::Text(txt))) = ws.next().await {
                let v: Value = serde_json::from_str(&txt).unwrap();
                assert_eq!(v[0], "EVENT");
                let ev: event::Event = serde_json::from_value(v[1].clone()).unwrap();
                if check_sig {
                    event::verify_event(&ev).unwrap();
                }
                ws.send(TMsg::Text(json!(["OK", ev.id, accept, reason]).to_string()))
                    .await
                    .unwrap();
            }
        });
        url
    }

    /// Mock relay that accepts the connection and never answers.
    async fn silent_relay() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _ = ws.next().await;
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        url
    }

    #[tokio::test]
    async fn input_invariants_checked_before_network() {
        let cfg = settings(vec![]);
        let cred = Credential::from_secret(SK).unwrap();
        let err = submit_review(&cfg, &cred, &target(), 0, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RatingOutOfRange(0)));
        let err = submit_review(&cfg, &cred, &target(), 6, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RatingOutOfRange(6)));
        let err = submit_review(&cfg, &cred, &target(), 3, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyComment));
    }

    #[tokio::test]
    async fn one_acceptance_is_overall_success() {
        let accepting = mock_publish_relay(true, "", true).await;
        let rejecting = mock_publish_relay(false, "blocked", false).await;
        let dead = "ws://127.0.0.1:1".to_string();
        let cfg = settings(vec![rejecting, accepting, dead]);
        let cred = Credential::from_secret(SK).unwrap();

        let report = submit_review(&cfg, &cred, &target(), 5, "excellent")
            .await
            .unwrap();
        assert!(report.succeeded());
        assert_eq!(report.accepted_count(), 1);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].1, RelayOutcome::Rejected("blocked".into()));
        assert_eq!(report.results[1].1, RelayOutcome::Accepted);
        assert!(matches!(report.results[2].1, RelayOutcome::ConnectFailed(_)));
    }

    #[tokio::test]
    async fn zero_acceptances_fail_with_every_reason() {
        let rejecting = mock_publish_relay(false, "rate-limited", false).await;
        let silent = silent_relay().await;
        let dead = "ws://127.0.0.1:1".to_string();
        let cfg = settings(vec![rejecting.clone(), silent.clone(), dead.clone()]);
        let cred = Credential::from_secret(SK).unwrap();

        let err = submit_review(&cfg, &cred, &target(), 4, "decent")
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(&rejecting));
        assert!(msg.contains("rate-limited"));
        assert!(msg.contains(&silent));
        assert!(msg.contains("timeout"));
        assert!(msg.contains(&dead));
        assert!(msg.contains("connection failed"));
    }

    #[tokio::test]
    async fn watch_only_credential_cannot_submit() {
        let cfg = settings(vec![]);
        let cred = Credential::watch_only(TARGET_HEX).unwrap();
        let err = submit_review(&cfg, &cred, &target(), 5, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }

    #[tokio::test]
    async fn published_event_round_trips_through_validation() {
        let accepting = mock_publish_relay(true, "", true).await;
        let cfg = settings(vec![accepting]);
        let cred = Credential::from_secret(SK).unwrap();

        let report = submit_review(&cfg, &cred, &target(), 2, "mediocre at best")
            .await
            .unwrap();
        assert!(report.succeeded());
        assert_eq!(report.event_id.len(), 64);

        // an identically built and signed event validates on the receiving side
        let unsigned = review::build_unsigned(&target().hex, 2, "mediocre at best", &cred.pubkey);
        let strategies = cred.signers().unwrap();
        let fetched = crate::signer::sign_with(&strategies, &unsigned).unwrap();
        let review = review::validate(&fetched, SigCheck::Enforce).unwrap();
        assert_eq!(review.rating, 2);
        assert_eq!(review.comment, "mediocre at best");
        assert_eq!(review.target, target().hex);
        assert!(review.verified);
    }
}
