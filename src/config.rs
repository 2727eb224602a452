//! Environment-driven configuration.
//!
//! No crate in this repo's lineage loads settings the way `pydantic-settings`
//! does in the original Python implementation, so this is a small hand-built
//! loader over `std::env` rather than a fabricated dependency. Field names
//! mirror `PAIN_RADAR_*` from the original for continuity.

use crate::error::{CoreError, Result};
use crate::model::Listing;

const ENV_PREFIX: &str = "PAIN_RADAR_";

/// Application settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM API key. Required to run the Analyst or Clusterer against a
    /// cloud provider; absent is fine for `OllamaBackend` against a local
    /// server.
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub default_listing: Listing,
    /// Posts fetched per subreddit, clamped to 1-100.
    pub posts_per_subreddit: u32,
    /// Top comments fetched per post, clamped to 0-100.
    pub top_comments: u32,
    /// Maximum concurrent requests/analyses, clamped to 1-50.
    pub max_concurrency: usize,
    pub db_path: String,
    pub user_agent: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_model: "gpt-4o".to_string(),
            default_listing: Listing::New,
            posts_per_subreddit: 25,
            top_comments: 15,
            max_concurrency: 8,
            db_path: "pain_radar.sqlite3".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset. Validates numeric ranges up front so
    /// that configuration errors fail fast, before any side effects.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Some(v) = env_var("LLM_API_KEY") {
            config.llm_api_key = Some(v);
        }
        if let Some(v) = env_var("LLM_MODEL") {
            config.llm_model = v;
        }
        if let Some(v) = env_var("LISTING") {
            config.default_listing = parse_listing(&v)?;
        }
        if let Some(v) = env_var("POSTS_PER_SUBREDDIT") {
            config.posts_per_subreddit = parse_ranged(&v, "POSTS_PER_SUBREDDIT", 1, 100)?;
        }
        if let Some(v) = env_var("TOP_COMMENTS") {
            config.top_comments = parse_ranged(&v, "TOP_COMMENTS", 0, 100)?;
        }
        if let Some(v) = env_var("MAX_CONCURRENCY") {
            config.max_concurrency = parse_ranged(&v, "MAX_CONCURRENCY", 1, 50)? as usize;
        }
        if let Some(v) = env_var("DB_PATH") {
            config.db_path = v;
        }
        if let Some(v) = env_var("USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = env_var("LOG_LEVEL") {
            config.log_level = v;
        }

        Ok(config)
    }

    /// Require an LLM API key, for entry points that call a cloud provider.
    pub fn require_llm_api_key(&self) -> Result<&str> {
        self.llm_api_key
            .as_deref()
            .ok_or_else(|| CoreError::Config("PAIN_RADAR_LLM_API_KEY is not set".into()))
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}")).ok()
}

fn parse_listing(value: &str) -> Result<Listing> {
    match value {
        "hot" => Ok(Listing::Hot),
        "new" => Ok(Listing::New),
        "top" => Ok(Listing::Top),
        "rising" => Ok(Listing::Rising),
        other => Err(CoreError::Config(format!(
            "invalid PAIN_RADAR_LISTING: '{other}' (expected hot, new, top, rising)"
        ))),
    }
}

fn parse_ranged(value: &str, field: &str, min: u32, max: u32) -> Result<u32> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| CoreError::Config(format!("invalid PAIN_RADAR_{field}: '{value}'")))?;
    if parsed < min || parsed > max {
        return Err(CoreError::Config(format!(
            "PAIN_RADAR_{field} must be between {min} and {max}, got {parsed}"
        )));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.posts_per_subreddit, 25);
        assert_eq!(config.top_comments, 15);
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.default_listing, Listing::New);
    }

    #[test]
    fn parse_ranged_rejects_out_of_bounds() {
        assert!(parse_ranged("0", "MAX_CONCURRENCY", 1, 50).is_err());
        assert!(parse_ranged("51", "MAX_CONCURRENCY", 1, 50).is_err());
        assert!(parse_ranged("8", "MAX_CONCURRENCY", 1, 50).is_ok());
    }

    #[test]
    fn parse_listing_rejects_unknown_values() {
        assert!(parse_listing("controversial").is_err());
        assert!(parse_listing("hot").is_ok());
    }

    #[test]
    fn require_llm_api_key_fails_fast_when_absent() {
        let config = Config {
            llm_api_key: None,
            ..Config::default()
        };
        assert!(config.require_llm_api_key().is_err());
    }
}
