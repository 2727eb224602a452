//! # pain-radar-core
//!
//! Mines Reddit for recurring user pain points: fetches posts, runs each
//! through an LLM analyst that extracts and scores a structured "signal",
//! persists results relationally, deduplicates near-identical signals, and
//! periodically clusters recent signals into weekly "Pain Cluster" digests.
//!
//! ## Core Concepts
//!
//! - **[`transport::Transport`]** / **[`fetch::SourceFetcher`]** — polite,
//!   bounded-concurrency RSS/JSON scraping of subreddits.
//! - **[`store::SignalStore`]** — the sole owner of persisted posts, runs,
//!   signals, clusters, source sets, and watchlists (`sqlx`/SQLite).
//! - **[`analyst::Analyst`]** — one structured-output LLM call per post,
//!   built on the [`llm_call::LlmCall`] / [`exec_ctx::ExecCtx`] /
//!   [`retry::RetryConfig`] triad, with a semantic validator enforcing
//!   "reject, do not repair" on top of structural JSON extraction.
//! - **[`dedup`]** — token-set fuzzy grouping of near-duplicate ideas.
//! - **[`cluster::Clusterer`]** — a single LLM call grouping recent signals
//!   into named Pain Clusters, with non-fatal degradation on failure.
//! - **[`orchestrator::Orchestrator`]** — the run lifecycle: fetch-or-load,
//!   bounded fan-out analysis, tally, and finally-on-failure Run bookkeeping.
//! - **[`watchlist`]** — keyword-match scan over recent signals.
//! - **[`config::Config`]** — `PAIN_RADAR_`-prefixed environment settings.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pain_radar_core::config::Config;
//! use pain_radar_core::analyst::Analyst;
//! use pain_radar_core::fetch::SourceFetcher;
//! use pain_radar_core::orchestrator::Orchestrator;
//! use pain_radar_core::store::SignalStore;
//! use pain_radar_core::transport::Transport;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let store = SignalStore::connect(&config.db_path).await?;
//!     let transport = Transport::new(&config.user_agent)?;
//!     let fetcher = SourceFetcher::new(transport);
//!     let analyst = Analyst::new(config.require_llm_api_key()?, &config.llm_model);
//!     let orchestrator = Orchestrator::new(store, fetcher, analyst, config);
//!
//!     let result = orchestrator
//!         .run(&["smallbusiness".to_string()], true, Some(25))
//!         .await?;
//!     println!("saved {} signals", result.signals_saved);
//!     Ok(())
//! }
//! ```
//!
//! The lower-level payload/retry/backend machinery ([`llm_call`],
//! [`exec_ctx`], [`backend`], [`output_parser`]) is general-purpose LLM
//! plumbing the Analyst and Clusterer are built on; it is public for reuse
//! but not the crate's primary surface.

// --- Payload layer (general-purpose LLM call plumbing) ---
pub mod backend;
pub mod client;
pub mod diagnostics;
pub mod events;
pub mod exec_ctx;
pub mod llm_call;
pub mod output_parser;
pub mod output_strategy;
pub mod parsing;
pub mod payload;
pub mod retry;
pub mod streaming;

// --- Primary surface: pain-signal mining pipeline ---
pub mod analyst;
pub mod cluster;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod transport;
pub mod watchlist;

// --- Primary exports: new payload API ---
pub use backend::{BackoffConfig, MockBackend, OllamaBackend};
#[cfg(feature = "openai")]
pub use backend::OpenAiBackend;
pub use diagnostics::ParseDiagnostics;
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use llm_call::LlmCall;
pub use output_strategy::OutputStrategy;
pub use payload::{BoxFut, Payload, PayloadOutput};
pub use retry::RetryConfig;
pub use streaming::StreamingDecoder;

// --- Re-exports: error taxonomy and primary pipeline types ---
pub use client::LlmConfig;
pub use error::{CoreError, Result};
pub use orchestrator::Orchestrator;
pub use analyst::Analyst;
pub use cluster::Clusterer;
pub use config::Config;
pub use fetch::SourceFetcher;
pub use model::PipelineResult;
pub use store::SignalStore;
pub use transport::Transport;
