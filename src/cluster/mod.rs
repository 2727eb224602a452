//! Clusterer: a single LLM call grouping recent unclustered pain signals
//! into named "Pain Clusters".
//!
//! Grounded on `original_source/src/pain_radar/cluster.py`'s
//! non-fatal-on-error idiom (`except Exception: return []`) — also the
//! idiom `fourthplaces-rootsignal`'s `cluster.rs` uses for its own
//! insufficient-input early-exit, even though that file's actual algorithm
//! (Leiden community detection) isn't reused here. A clustering failure
//! never fails a pipeline run; it just yields no clusters this cycle.

pub mod digest;
pub mod prompt;

use crate::backend::BackoffConfig;
use crate::exec_ctx::ExecCtx;
use crate::llm_call::LlmCall;
use crate::model::{Cluster, ClusterItem};
use crate::payload::Payload;
use crate::retry::RetryConfig;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct Clusterer {
    ctx: ExecCtx,
    model: String,
}

#[derive(Deserialize)]
struct ClusterOutput {
    clusters: Vec<RawCluster>,
}

#[derive(Deserialize)]
struct RawCluster {
    title: String,
    summary: String,
    target_audience: String,
    why_it_matters: String,
    signal_ids: Vec<i64>,
    quotes: Vec<String>,
    urls: Vec<String>,
}

impl Clusterer {
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

    /// Cluster `items` into named patterns for the week starting
    /// `week_start` (an ISO date string). Returns an empty vector -- never
    /// an error -- on empty input or any LLM/parse failure.
    pub async fn cluster_items(&self, items: &[ClusterItem], week_start: &str) -> Vec<Cluster> {
        if items.is_empty() {
            return Vec::new();
        }

        let user_prompt = prompt::build_user_prompt(items);

        let call = LlmCall::new("cluster", "{input}")
            .with_system(prompt::SYSTEM_PROMPT)
            .with_model(self.model.clone())
            .expecting_json()
            .with_retry(RetryConfig::new(2).with_validator(validate_cluster_output));

        let output = match call.invoke(&self.ctx, Value::String(user_prompt)).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "clustering_failed");
                return Vec::new();
            }
        };

        let parsed: ClusterOutput = match output.parse_as() {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "cluster_output_parse_failed");
                return Vec::new();
            }
        };

        parsed
            .clusters
            .into_iter()
            .map(|raw| Cluster {
                id: String::new(),
                title: raw.title,
                summary: raw.summary,
                week_start: week_start.to_string(),
                target_audience: raw.target_audience,
                why_it_matters: raw.why_it_matters,
                signal_ids: raw.signal_ids,
                quotes: raw.quotes,
                urls: raw.urls,
                created_at: String::new(),
            })
            .collect()
    }
}

fn validate_cluster_output(_raw: &str, value: &Value) -> std::result::Result<(), String> {
    let clusters = value
        .get("clusters")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "missing 'clusters' array".to_string())?;

    for (i, cluster) in clusters.iter().enumerate() {
        if cluster.get("title").and_then(|v| v.as_str()).is_none() {
            return Err(format!("clusters[{i}] missing title"));
        }
        if cluster
            .get("signal_ids")
            .and_then(|v| v.as_array())
            .map(|a| a.is_empty())
            .unwrap_or(true)
        {
            return Err(format!("clusters[{i}] has no signal_ids"));
        }
    }

    Ok(())
}
