//! LLM Analyst: a single structured-output call per post, extracting and
//! scoring a pain signal in one pass.
//!
//! Built on the teacher's [`crate::llm_call::LlmCall`] /
//! [`crate::exec_ctx::ExecCtx`] / [`crate::retry::RetryConfig`] triad rather
//! than a bespoke HTTP client: `OutputStrategy::Json` does structural JSON
//! extraction/repair, and a semantic [`crate::retry::RetryConfig::with_validator`]
//! enforces the "reject, do not repair" rule for business-rule violations
//! (bad enum values, out-of-range scores, an extracted signal with no
//! score). Both layer onto [`crate::backend::BackoffConfig::llm_default`]
//! for the transport-level retry loop.

pub mod prompt;

use crate::error::{CoreError, Result};
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::model::{Analysis, Post};
use crate::payload::Payload;
use crate::retry::RetryConfig;
use crate::backend::BackoffConfig;
use serde_json::{json, Value};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct Analyst {
    ctx: ExecCtx,
    model: String,
}

impl Analyst {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        let ctx = ExecCtx::builder(OPENAI_BASE_URL)
            .openai_with_key(api_key)
            .backoff(BackoffConfig::llm_default())
            .build();
        Self {
            ctx,
            model: model.into(),
        }
    }

    /// Run the full extraction+scoring call for one post.
    pub async fn analyze(&self, post: &Post) -> Result<Analysis> {
        let user_prompt = prompt::build_user_prompt(post);

        let call = LlmCall::new("full_analysis", "{input}")
            .with_system(prompt::SYSTEM_PROMPT)
            .with_model(self.model.clone())
            .expecting_json()
            .with_retry(RetryConfig::new(3).with_validator(validate_analysis));

        let output = call
            .invoke(&self.ctx, Value::String(user_prompt))
            .await
            .map_err(|e| CoreError::Analysis {
                post_id: post.id.clone(),
                message: e.to_string(),
            })?;

        output.parse_as::<Analysis>().map_err(|e| CoreError::Analysis {
            post_id: post.id.clone(),
            message: e.to_string(),
        })
    }
}

/// Semantic validator enforcing the business-rule invariants beyond
/// structural JSON parsing: valid enum values, in-range dimension scores,
/// a properly-bounded competitor landscape, and the "score is present for
/// `extracted`/`disqualified`, absent for `not_extractable`" invariant.
fn validate_analysis(_raw: &str, value: &Value) -> std::result::Result<(), String> {
    let extraction = value
        .get("extraction")
        .ok_or_else(|| "missing 'extraction'".to_string())?;

    let state = extraction
        .get("extraction_state")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "missing extraction.extraction_state".to_string())?;

    if !["extracted", "not_extractable", "disqualified"].contains(&state) {
        return Err(format!("invalid extraction_state: '{state}'"));
    }

    if extraction.get("signal_summary").and_then(|v| v.as_str()).is_none() {
        return Err("missing extraction.signal_summary".to_string());
    }

    for (i, ev) in extraction
        .get("evidence")
        .and_then(|v| v.as_array())
        .unwrap_or(&Vec::new())
        .iter()
        .enumerate()
    {
        let quote = ev
            .get("quote")
            .and_then(|v| v.as_str())
            .ok_or_else(|| format!("evidence[{i}] missing quote"))?;
        if quote.split_whitespace().count() > 25 {
            return Err(format!("evidence[{i}] quote exceeds 25 words"));
        }
    }

    let score = value.get("score").filter(|v| !v.is_null());

    match (state, score) {
        ("extracted" | "disqualified", None) => {
            Err(format!("extraction_state is '{state}' but score is null"))
        }
        ("not_extractable", Some(_)) => {
            Err("extraction_state is 'not_extractable' but score is present".to_string())
        }
        ("extracted" | "disqualified", Some(score)) => validate_score(score),
        _ => Ok(()),
    }
}

fn validate_score(score: &Value) -> std::result::Result<(), String> {
    for dim in ["practicality", "profitability", "distribution", "competition", "moat"] {
        let v = score
            .get(dim)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| format!("score.{dim} missing or not an integer"))?;
        if !(0..=10).contains(&v) {
            return Err(format!("score.{dim} = {v} is outside 0-10"));
        }
    }

    let confidence = score
        .get("confidence")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "score.confidence missing".to_string())?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(format!("score.confidence = {confidence} is outside 0.0-1.0"));
    }

    let landscape_len = score
        .get("competition_landscape")
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0);
    if !(1..=5).contains(&landscape_len) {
        return Err(format!(
            "competition_landscape has {landscape_len} entries, expected 1-5"
        ));
    }

    let wedge = score
        .get("distribution_wedge")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "score.distribution_wedge missing".to_string())?;
    let valid_wedges = [
        "ecosystem",
        "partner_channel",
        "seo",
        "influencer_affiliate",
        "community",
        "product_led",
    ];
    if !valid_wedges.contains(&wedge) {
        return Err(format!("invalid distribution_wedge: '{wedge}'"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_extracted() -> Value {
        json!({
            "extraction": {
                "extraction_state": "extracted",
                "extraction_type": "idea",
                "signal_summary": "Need a tool for X",
                "target_user": "indie devs",
                "pain_point": "manual process",
                "proposed_solution": "automate it",
                "evidence": [
                    {"quote": "I'd pay for this", "source": "comment", "comment_index": 0, "signal_type": "willingness_to_pay"}
                ],
                "evidence_strength": 7,
                "evidence_strength_reason": "clear WTP signal",
                "risk_flags": [],
                "not_extractable_reason": null
            },
            "score": {
                "disqualified": false,
                "disqualify_reasons": [],
                "practicality": 8,
                "profitability": 7,
                "distribution": 6,
                "competition": 5,
                "moat": 4,
                "confidence": 0.8,
                "distribution_wedge": "seo",
                "distribution_wedge_detail": "SEO: checkout abandonment",
                "competition_landscape": [
                    {"category": "checkout plugins", "examples": [], "your_wedge": "niche focus"}
                ],
                "why": ["solid scope"],
                "next_validation_steps": ["talk to 5 users"]
            }
        })
    }

    #[test]
    fn accepts_well_formed_extracted_analysis() {
        assert!(validate_analysis("", &valid_extracted()).is_ok());
    }

    #[test]
    fn rejects_extracted_with_null_score() {
        let mut v = valid_extracted();
        v["score"] = Value::Null;
        assert!(validate_analysis("", &v).is_err());
    }

    #[test]
    fn rejects_not_extractable_with_a_score() {
        let mut v = valid_extracted();
        v["extraction"]["extraction_state"] = json!("not_extractable");
        assert!(validate_analysis("", &v).is_err());
    }

    #[test]
    fn rejects_out_of_range_dimension() {
        let mut v = valid_extracted();
        v["score"]["practicality"] = json!(15);
        assert!(validate_analysis("", &v).is_err());
    }

    #[test]
    fn rejects_empty_competition_landscape() {
        let mut v = valid_extracted();
        v["score"]["competition_landscape"] = json!([]);
        assert!(validate_analysis("", &v).is_err());
    }

    #[test]
    fn rejects_unknown_distribution_wedge() {
        let mut v = valid_extracted();
        v["score"]["distribution_wedge"] = json!("magic");
        assert!(validate_analysis("", &v).is_err());
    }

    #[test]
    fn rejects_overlong_evidence_quote() {
        let mut v = valid_extracted();
        let long_quote = (0..30).map(|_| "word").collect::<Vec<_>>().join(" ");
        v["extraction"]["evidence"][0]["quote"] = json!(long_quote);
        assert!(validate_analysis("", &v).is_err());
    }

    #[test]
    fn accepts_disqualified_with_a_score() {
        let mut v = valid_extracted();
        v["extraction"]["extraction_state"] = json!("disqualified");
        v["score"]["disqualified"] = json!(true);
        v["score"]["disqualify_reasons"] = json!(["no monetization path"]);
        assert!(validate_analysis("", &v).is_ok());
    }

    #[test]
    fn rejects_disqualified_with_null_score() {
        let mut v = valid_extracted();
        v["extraction"]["extraction_state"] = json!("disqualified");
        v["score"] = Value::Null;
        assert!(validate_analysis("", &v).is_err());
    }

    #[test]
    fn accepts_not_extractable_without_score() {
        let v = json!({
            "extraction": {
                "extraction_state": "not_extractable",
                "extraction_type": "idea",
                "signal_summary": "No viable signal",
                "evidence": [],
                "evidence_strength": 0,
                "not_extractable_reason": "meta post"
            },
            "score": null
        });
        assert!(validate_analysis("", &v).is_ok());
    }
}
