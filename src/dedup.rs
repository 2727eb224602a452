//! Near-duplicate idea deduplication via token-set string similarity.
//!
//! No crate in the retrieved pack implements `rapidfuzz`'s `token_set_ratio`
//! (the original's dependency), so this is a hand-rolled equivalent: tokens
//! are split on whitespace, the intersection and each side's leftover tokens
//! are recombined into three strings, and the best pairwise Levenshtein
//! ratio among them is the token-set score. Field weighting and the
//! first-unassigned-becomes-canonical clustering loop match
//! `dedupe_ideas`/`combined_similarity` exactly, with both the threshold
//! and the per-field weights exposed as constructor parameters.

use crate::model::Extraction;
use std::collections::BTreeSet;

pub const DEFAULT_THRESHOLD: f64 = 0.75;
pub const DEFAULT_SUMMARY_WEIGHT: f64 = 0.5;
pub const DEFAULT_PAIN_WEIGHT: f64 = 0.25;
pub const DEFAULT_USER_WEIGHT: f64 = 0.25;

/// One cluster of near-duplicate ideas: a canonical post id/extraction plus
/// the post ids merged into it.
#[derive(Debug, Clone)]
pub struct DedupeGroup {
    pub canonical_post_id: String,
    pub extraction: Extraction,
    pub duplicate_post_ids: Vec<String>,
}

/// Token-set similarity ratio between two strings, normalized to 0.0-1.0.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    let sorted_join = |mut tokens: Vec<&str>| {
        tokens.sort_unstable();
        tokens.join(" ")
    };

    let t0 = sorted_join(intersection.clone());
    let t1 = if only_a.is_empty() {
        t0.clone()
    } else {
        format!("{t0} {}", sorted_join(only_a))
    };
    let t2 = if only_b.is_empty() {
        t0.clone()
    } else {
        format!("{t0} {}", sorted_join(only_b))
    };

    levenshtein_ratio(&t0, &t1)
        .max(levenshtein_ratio(&t0, &t2))
        .max(levenshtein_ratio(&t1, &t2))
}

/// Groups near-duplicate ideas with a configurable similarity threshold and
/// per-field weights, per the "expose both as parameters" design note.
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    pub threshold: f64,
    pub summary_weight: f64,
    pub pain_weight: f64,
    pub user_weight: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            summary_weight: DEFAULT_SUMMARY_WEIGHT,
            pain_weight: DEFAULT_PAIN_WEIGHT,
            user_weight: DEFAULT_USER_WEIGHT,
        }
    }
}

impl Deduplicator {
    /// Build a deduplicator with an explicit threshold and field weights.
    pub fn new(threshold: f64, summary_weight: f64, pain_weight: f64, user_weight: f64) -> Self {
        Self {
            threshold,
            summary_weight,
            pain_weight,
            user_weight,
        }
    }

    /// Weighted combination of signal_summary/pain_point/target_user
    /// similarity. A field contributes 0.0 if either side is empty.
    pub fn combined_similarity(&self, a: &Extraction, b: &Extraction) -> f64 {
        let summary_sim = similarity_ratio(&a.signal_summary, &b.signal_summary);
        let pain_sim = if !a.pain_point.is_empty() && !b.pain_point.is_empty() {
            similarity_ratio(&a.pain_point, &b.pain_point)
        } else {
            0.0
        };
        let user_sim = if !a.target_user.is_empty() && !b.target_user.is_empty() {
            similarity_ratio(&a.target_user, &b.target_user)
        } else {
            0.0
        };

        summary_sim * self.summary_weight + pain_sim * self.pain_weight + user_sim * self.user_weight
    }

    /// Group near-duplicate ideas, keeping the first occurrence in `ideas`
    /// as canonical. "No viable signal" sentinel extractions are never
    /// treated as canonical or merged into another group -- each becomes
    /// its own zero-duplicate group.
    pub fn dedupe(&self, ideas: &[(String, Extraction)]) -> Vec<DedupeGroup> {
        let mut assigned: BTreeSet<&str> = BTreeSet::new();
        let mut groups = Vec::new();

        for (i, (post_id, extraction)) in ideas.iter().enumerate() {
            if assigned.contains(post_id.as_str()) {
                continue;
            }

            if extraction.is_no_viable_signal() {
                assigned.insert(post_id.as_str());
                groups.push(DedupeGroup {
                    canonical_post_id: post_id.clone(),
                    extraction: extraction.clone(),
                    duplicate_post_ids: Vec::new(),
                });
                continue;
            }

            let mut duplicates = Vec::new();

            for (other_id, other_extraction) in &ideas[i + 1..] {
                if assigned.contains(other_id.as_str()) {
                    continue;
                }
                if other_extraction.is_no_viable_signal() {
                    continue;
                }

                let sim = self.combined_similarity(extraction, other_extraction);
                if sim >= self.threshold {
                    duplicates.push(other_id.clone());
                    assigned.insert(other_id.as_str());
                }
            }

            assigned.insert(post_id.as_str());
            groups.push(DedupeGroup {
                canonical_post_id: post_id.clone(),
                extraction: extraction.clone(),
                duplicate_post_ids: duplicates,
            });
        }

        groups
    }
}

fn levenshtein_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let distance = levenshtein_distance(a, b);
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        1.0
    } else {
        (total - distance) as f64 / total as f64
    }
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractionState;

    fn extraction(summary: &str, pain: &str, user: &str) -> Extraction {
        Extraction {
            extraction_state: ExtractionState::Extracted,
            extraction_type: Default::default(),
            signal_summary: summary.to_string(),
            target_user: user.to_string(),
            pain_point: pain.to_string(),
            proposed_solution: String::new(),
            evidence: vec![],
            evidence_strength: 5,
            evidence_strength_reason: String::new(),
            risk_flags: vec![],
            not_extractable_reason: None,
        }
    }

    #[test]
    fn identical_strings_are_fully_similar() {
        assert_eq!(similarity_ratio("checkout abandonment tool", "checkout abandonment tool"), 1.0);
    }

    #[test]
    fn reordered_tokens_still_score_highly() {
        let sim = similarity_ratio("tool for checkout abandonment", "checkout abandonment tool");
        assert!(sim > 0.9, "expected high similarity, got {sim}");
    }

    #[test]
    fn unrelated_strings_score_low() {
        let sim = similarity_ratio("checkout abandonment saas", "cooking recipe blog");
        assert!(sim < 0.5, "expected low similarity, got {sim}");
    }

    #[test]
    fn combined_similarity_weights_summary_most_heavily() {
        let a = extraction("identical summary text", "different pain here", "different user here");
        let b = extraction("identical summary text", "totally unrelated", "nothing alike");
        let sim = Deduplicator::default().combined_similarity(&a, &b);
        assert!(sim > 0.4 && sim < 0.6, "expected ~0.5 (summary weight only), got {sim}");
    }

    #[test]
    fn custom_weights_are_honored() {
        let a = extraction("identical summary text", "different pain here", "different user here");
        let b = extraction("identical summary text", "totally unrelated", "nothing alike");
        let equal_weights = Deduplicator::new(0.75, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
        let sim = equal_weights.combined_similarity(&a, &b);
        // With equal weights the summary-only match contributes ~1/3, not ~1/2.
        assert!(sim > 0.2 && sim < 0.4, "expected ~0.33, got {sim}");
    }

    #[test]
    fn dedupe_groups_near_duplicates_under_first_canonical() {
        let ideas = vec![
            ("p1".to_string(), extraction("checkout abandonment tool for SaaS", "carts abandoned", "SaaS founders")),
            ("p2".to_string(), extraction("checkout abandonment tool for SaaS", "carts abandoned", "SaaS founders")),
            ("p3".to_string(), extraction("completely different idea about gardening", "weeds", "gardeners")),
        ];
        let groups = Deduplicator::default().dedupe(&ideas);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].canonical_post_id, "p1");
        assert_eq!(groups[0].duplicate_post_ids, vec!["p2".to_string()]);
        assert_eq!(groups[1].canonical_post_id, "p3");
        assert!(groups[1].duplicate_post_ids.is_empty());
    }

    #[test]
    fn no_viable_signal_sentinels_never_merge() {
        let ideas = vec![
            ("p1".to_string(), extraction("No viable signal", "", "")),
            ("p2".to_string(), extraction("No viable signal", "", "")),
        ];
        let groups = Deduplicator::default().dedupe(&ideas);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.duplicate_post_ids.is_empty()));
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(Deduplicator::default().dedupe(&[]).is_empty());
    }

    #[test]
    fn stricter_threshold_stops_near_duplicates_merging() {
        let ideas = vec![
            ("p1".to_string(), extraction("tool for checkout abandonment", "carts abandoned", "SaaS founders")),
            ("p2".to_string(), extraction("abandonment checkout tool", "carts abandoned", "SaaS founders")),
        ];
        let strict = Deduplicator::new(0.999, DEFAULT_SUMMARY_WEIGHT, DEFAULT_PAIN_WEIGHT, DEFAULT_USER_WEIGHT);
        let groups = strict.dedupe(&ideas);
        assert_eq!(groups.len(), 2, "threshold of 0.999 should reject a near-duplicate match");
    }
}
