//! Watchlist Scan: keyword-match over recent signals.
//!
//! Grounded on `store::get_recent_signals`/`record_alert_match`'s existing
//! idempotency contract (unique `(watchlist_id, signal_id)` constraint);
//! this module supplies the scan logic that decides which keyword, if any,
//! matches a signal for a given watchlist.

use crate::error::Result;
use crate::model::Watchlist;
use crate::store::SignalStore;
use tracing::info;

/// One new (watchlist, signal, keyword) match produced by a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchlistMatch {
    pub watchlist_id: i64,
    pub signal_id: i64,
    pub keyword: String,
}

/// Scan signals created in the last `since_hours` against all active
/// watchlists, recording at most one match per (watchlist, signal) pair.
/// Returns the matches newly recorded this scan (pre-existing pairs are
/// silently skipped by the store's idempotent insert, and are not
/// re-reported here).
pub async fn scan(store: &SignalStore, since_hours: i64) -> Result<Vec<WatchlistMatch>> {
    let watchlists = store.get_active_watchlists().await?;
    if watchlists.is_empty() {
        return Ok(Vec::new());
    }

    let signals = store.get_recent_signals(since_hours).await?;
    let mut matches = Vec::new();

    for watchlist in &watchlists {
        for (signal, post_title, post_subreddit) in &signals {
            if let Some(subreddits) = &watchlist.subreddits {
                if !subreddits.iter().any(|s| s == post_subreddit) {
                    continue;
                }
            }

            let Some(keyword) = first_matching_keyword(watchlist, signal_haystack(signal, post_title)) else {
                continue;
            };

            store
                .record_alert_match(watchlist.id, signal.id, &keyword)
                .await?;

            matches.push(WatchlistMatch {
                watchlist_id: watchlist.id,
                signal_id: signal.id,
                keyword,
            });
        }
    }

    info!(
        watchlists = watchlists.len(),
        signals = signals.len(),
        matches = matches.len(),
        "watchlist_scan_complete"
    );

    Ok(matches)
}

fn signal_haystack(signal: &crate::model::Signal, post_title: &str) -> String {
    format!(
        "{} {} {}",
        signal.extraction.signal_summary, signal.extraction.pain_point, post_title
    )
    .to_lowercase()
}

/// First keyword (in the watchlist's listed order) found in `haystack`.
fn first_matching_keyword(watchlist: &Watchlist, haystack: String) -> Option<String> {
    watchlist
        .keywords
        .iter()
        .find(|kw| haystack.contains(&kw.to_lowercase()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Extraction, ExtractionState, Score, Signal};

    fn watchlist(id: i64, keywords: &[&str], subreddits: Option<Vec<&str>>) -> Watchlist {
        Watchlist {
            id,
            name: "test".into(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            subreddits: subreddits.map(|v| v.into_iter().map(String::from).collect()),
            notification_email: None,
            notification_webhook: None,
            is_active: true,
            created_at: String::new(),
            updated_at: None,
            last_checked_at: None,
            total_matches: 0,
        }
    }

    fn signal(id: i64, summary: &str, pain: &str) -> Signal {
        Signal {
            id,
            post_id: "p1".into(),
            run_id: None,
            cluster_id: None,
            extraction: Extraction {
                extraction_state: ExtractionState::Extracted,
                extraction_type: Default::default(),
                signal_summary: summary.to_string(),
                target_user: String::new(),
                pain_point: pain.to_string(),
                proposed_solution: String::new(),
                evidence: vec![],
                evidence_strength: 5,
                evidence_strength_reason: String::new(),
                risk_flags: vec![],
                not_extractable_reason: None,
            },
            score: None::<Score>,
            disqualified: false,
            total_score: 0,
            created_at: String::new(),
            raw_extraction: String::new(),
            raw_score: None,
        }
    }

    #[test]
    fn matches_first_keyword_case_insensitively() {
        let wl = watchlist(1, &["Checkout", "billing"], None);
        let s = signal(1, "Checkout abandonment tool", "carts dropped");
        let haystack = signal_haystack(&s, "My checkout woes");
        assert_eq!(first_matching_keyword(&wl, haystack), Some("Checkout".to_string()));
    }

    #[test]
    fn no_match_returns_none() {
        let wl = watchlist(1, &["gardening"], None);
        let s = signal(1, "Checkout abandonment tool", "carts dropped");
        let haystack = signal_haystack(&s, "unrelated title");
        assert_eq!(first_matching_keyword(&wl, haystack), None);
    }

    #[tokio::test]
    async fn scan_skips_signals_outside_watchlist_subreddit_scope() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store
            .upsert_posts(&[crate::model::Post {
                id: "p1".into(),
                subreddit: "gardening".into(),
                title: "Checkout woes".into(),
                body: String::new(),
                created_utc: 0,
                score: 1,
                num_comments: 0,
                url: None,
                permalink: None,
                top_comments: vec![],
            }])
            .await
            .unwrap();
        store
            .save_signal(
                "p1",
                &crate::model::Analysis {
                    extraction: signal(0, "Checkout abandonment tool", "carts dropped").extraction,
                    score: None,
                },
                None,
            )
            .await
            .unwrap();

        let wl = watchlist(1, &["checkout"], Some(vec!["saas"]));
        store.create_watchlist(&wl).await.unwrap();

        let matches = scan(&store, 24).await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn scan_records_idempotent_match() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store
            .upsert_posts(&[crate::model::Post {
                id: "p1".into(),
                subreddit: "saas".into(),
                title: "Checkout woes".into(),
                body: String::new(),
                created_utc: 0,
                score: 1,
                num_comments: 0,
                url: None,
                permalink: None,
                top_comments: vec![],
            }])
            .await
            .unwrap();
        store
            .save_signal(
                "p1",
                &crate::model::Analysis {
                    extraction: signal(0, "Checkout abandonment tool", "carts dropped").extraction,
                    score: None,
                },
                None,
            )
            .await
            .unwrap();

        let wl = watchlist(1, &["checkout"], None);
        store.create_watchlist(&wl).await.unwrap();

        let first = scan(&store, 24).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].keyword, "checkout");

        // Re-scanning does not error on the idempotent insert, and reports
        // the match again since this scan window still includes the signal.
        let second = scan(&store, 24).await.unwrap();
        assert_eq!(second.len(), 1);
    }
}
