//! Domain types shared across the fetcher, analyst, store, and clusterer.
//!
//! Mirrors the Signal data model: a [`Post`] is fetched, an [`Analysis`] is
//! produced for it by the analyst, and the pair is persisted as a [`Signal`]
//! row owned exclusively by the Signal Store. Other components only ever
//! hold value copies.

use serde::{Deserialize, Serialize};

/// An immutable snapshot of a scraped discussion thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Stable external post id (e.g. Reddit's `t3_...` base36 id).
    pub id: String,
    pub subreddit: String,
    pub title: String,
    /// Body text; may be empty for link posts.
    pub body: String,
    pub created_utc: i64,
    /// Popularity score; may be 0 if unavailable.
    pub score: i64,
    pub num_comments: i64,
    pub url: Option<String>,
    pub permalink: Option<String>,
    pub top_comments: Vec<String>,
}

/// One pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub subreddits: Vec<String>,
    pub posts_fetched: i64,
    pub posts_analyzed: i64,
    pub signals_saved: i64,
    pub qualified_signals: i64,
    pub not_extractable: i64,
    pub errors: i64,
    pub status: RunStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Running,
        }
    }
}

/// State of idea extraction for one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionState {
    Extracted,
    NotExtractable,
    Disqualified,
}

impl ExtractionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionState::Extracted => "extracted",
            ExtractionState::NotExtractable => "not_extractable",
            ExtractionState::Disqualified => "disqualified",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "not_extractable" => ExtractionState::NotExtractable,
            "disqualified" => ExtractionState::Disqualified,
            _ => ExtractionState::Extracted,
        }
    }
}

/// Whether the extracted signal is a productizable idea or a raw pain point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionType {
    Idea,
    Pain,
}

impl Default for ExtractionType {
    fn default() -> Self {
        ExtractionType::Idea
    }
}

/// Source of an evidence quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    Post,
    Comment,
}

/// Kind of demand signal an evidence quote represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Pain,
    WillingnessToPay,
    Alternatives,
    Urgency,
    Repetition,
    Budget,
}

/// A single attributed quote backing a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSignal {
    pub quote: String,
    pub source: EvidenceSource,
    pub comment_index: Option<u32>,
    pub signal_type: SignalType,
}

/// Primary distribution channel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionWedge {
    Ecosystem,
    PartnerChannel,
    Seo,
    InfluencerAffiliate,
    Community,
    ProductLed,
}

/// A single competitor/alternative in the landscape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorNote {
    pub category: String,
    #[serde(default)]
    pub examples: Vec<String>,
    pub your_wedge: String,
}

/// The non-scoring part of a signal: state, summary, target user, pain
/// point, solution, and evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub extraction_state: ExtractionState,
    #[serde(default)]
    pub extraction_type: ExtractionType,
    pub signal_summary: String,
    #[serde(default)]
    pub target_user: String,
    #[serde(default)]
    pub pain_point: String,
    #[serde(default)]
    pub proposed_solution: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceSignal>,
    #[serde(default)]
    pub evidence_strength: u8,
    #[serde(default)]
    pub evidence_strength_reason: String,
    #[serde(default)]
    pub risk_flags: Vec<String>,
    #[serde(default)]
    pub not_extractable_reason: Option<String>,
}

impl Extraction {
    /// Sentinel summary used for posts with no viable signal; the
    /// deduplicator never treats these as canonical or merges into them.
    pub const NO_VIABLE_SIGNAL: &'static str = "No viable signal";

    pub fn is_no_viable_signal(&self) -> bool {
        self.signal_summary.to_lowercase().starts_with("no viable")
    }
}

/// The five-dimension rubric plus derived total and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub disqualified: bool,
    #[serde(default)]
    pub disqualify_reasons: Vec<String>,
    pub practicality: u8,
    pub profitability: u8,
    pub distribution: u8,
    pub competition: u8,
    pub moat: u8,
    pub confidence: f64,
    pub distribution_wedge: DistributionWedge,
    pub distribution_wedge_detail: String,
    pub competition_landscape: Vec<CompetitorNote>,
    #[serde(default)]
    pub why: Vec<String>,
    #[serde(default)]
    pub next_validation_steps: Vec<String>,
}

impl Score {
    /// Sum of all dimension scores (0-50).
    pub fn total(&self) -> i64 {
        self.practicality as i64
            + self.profitability as i64
            + self.distribution as i64
            + self.competition as i64
            + self.moat as i64
    }
}

/// Complete analysis output: extraction plus an optional score. Score is
/// `None` exactly when `extraction.extraction_state != Extracted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub extraction: Extraction,
    pub score: Option<Score>,
}

/// The analyst's structured output for one post, as persisted in the store.
#[derive(Debug, Clone)]
pub struct Signal {
    pub id: i64,
    pub post_id: String,
    pub run_id: Option<i64>,
    pub cluster_id: Option<String>,
    pub extraction: Extraction,
    pub score: Option<Score>,
    pub disqualified: bool,
    pub total_score: i64,
    pub created_at: String,
    pub raw_extraction: String,
    pub raw_score: Option<String>,
}

impl Signal {
    /// Extracted AND not disqualified.
    pub fn is_qualified(&self) -> bool {
        self.extraction.extraction_state == ExtractionState::Extracted && !self.disqualified
    }
}

/// A minimal reference to an extracted pain signal, used for clustering.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterItem {
    pub id: i64,
    pub summary: String,
    pub pain_point: String,
    pub subreddit: String,
    pub url: String,
    pub evidence: Vec<EvidenceSignal>,
}

/// A named grouping of recent non-disqualified signals (Pain Cluster).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub week_start: String,
    pub target_audience: String,
    pub why_it_matters: String,
    pub signal_ids: Vec<i64>,
    pub quotes: Vec<String>,
    pub urls: Vec<String>,
    pub created_at: String,
}

/// Reddit listing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Listing {
    Hot,
    New,
    Top,
    Rising,
}

impl Listing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Listing::Hot => "hot",
            Listing::New => "new",
            Listing::Top => "top",
            Listing::Rising => "rising",
        }
    }
}

/// A named bundle of source communities with fetch parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSet {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub preset_key: Option<String>,
    pub subreddits: Vec<String>,
    pub listing: String,
    pub limit_per_sub: i64,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

/// A keyword filter over recent signals with notification endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchlist {
    pub id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub subreddits: Option<Vec<String>>,
    pub notification_email: Option<String>,
    pub notification_webhook: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub last_checked_at: Option<String>,
    pub total_matches: i64,
}

/// A (watchlist, signal, keyword) match triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMatch {
    pub id: i64,
    pub watchlist_id: i64,
    pub signal_id: i64,
    pub keyword_matched: String,
    pub created_at: String,
    pub notified: bool,
    pub notified_at: Option<String>,
}

/// The pipeline result object exposed to callers of [`crate::orchestrator`].
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: i64,
    pub posts_fetched: i64,
    pub posts_analyzed: i64,
    pub signals_saved: i64,
    pub errors: i64,
    pub qualified_signals: i64,
    pub top_signals: Vec<TopSignal>,
}

/// A denormalized signal + post join, as returned by top-signal queries.
#[derive(Debug, Clone, Serialize)]
pub struct TopSignal {
    pub signal: SignalSummaryFields,
    pub post_title: String,
    pub post_url: Option<String>,
}

/// Flat, serializable view of a [`Signal`] for external consumption.
#[derive(Debug, Clone, Serialize)]
pub struct SignalSummaryFields {
    pub id: i64,
    pub post_id: String,
    pub signal_summary: String,
    pub total_score: i64,
    pub disqualified: bool,
}

impl From<&Signal> for SignalSummaryFields {
    fn from(s: &Signal) -> Self {
        Self {
            id: s.id,
            post_id: s.post_id.clone(),
            signal_summary: s.extraction.signal_summary.clone(),
            total_score: s.total_score,
            disqualified: s.disqualified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_total_sums_dimensions() {
        let score = Score {
            disqualified: false,
            disqualify_reasons: vec![],
            practicality: 8,
            profitability: 8,
            distribution: 8,
            competition: 5,
            moat: 5,
            confidence: 0.9,
            distribution_wedge: DistributionWedge::Seo,
            distribution_wedge_detail: "SEO: checkout abandonment".into(),
            competition_landscape: vec![],
            why: vec![],
            next_validation_steps: vec![],
        };
        assert_eq!(score.total(), 34);
    }

    #[test]
    fn extraction_detects_no_viable_signal_sentinel() {
        let e = Extraction {
            extraction_state: ExtractionState::NotExtractable,
            extraction_type: ExtractionType::Idea,
            signal_summary: "No viable signal".into(),
            target_user: String::new(),
            pain_point: String::new(),
            proposed_solution: String::new(),
            evidence: vec![],
            evidence_strength: 0,
            evidence_strength_reason: String::new(),
            risk_flags: vec![],
            not_extractable_reason: Some("meta post".into()),
        };
        assert!(e.is_no_viable_signal());
    }

    #[test]
    fn run_status_round_trips_through_str() {
        for status in [RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(RunStatus::from_str(status.as_str()), status);
        }
    }
}
