//! Pipeline Orchestrator: ties the Source Fetcher, LLM Analyst, and Signal
//! Store into one run lifecycle.
//!
//! Generalizes the teacher's single-chain `ExecCtx` + retry idiom to many
//! concurrent per-post analysis tasks gated by a [`tokio::sync::Semaphore`],
//! collected as they complete with [`futures::stream::FuturesUnordered`]
//! rather than awaited one at a time (the teacher has no fan-out precedent
//! of its own for this; the bounded-semaphore-gated task pattern is pack
//! enrichment). Finally-on-failure semantics mirror the teacher's
//! `Chain`/`Pipeline` error propagation: a failed run is still recorded as
//! `failed` before the error is re-raised.

use crate::analyst::Analyst;
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::fetch::SourceFetcher;
use crate::model::{ExtractionState, PipelineResult, Post, RunStatus};
use crate::store::SignalStore;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub struct Orchestrator {
    store: SignalStore,
    fetcher: SourceFetcher,
    analyst: Analyst,
    config: Config,
    cancel: Option<Arc<AtomicBool>>,
}

impl Orchestrator {
    pub fn new(store: SignalStore, fetcher: SourceFetcher, analyst: Analyst, config: Config) -> Self {
        Self {
            store,
            fetcher,
            analyst,
            config,
            cancel: None,
        }
    }

    /// Attach a cancellation flag, checked before each per-post task starts.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Run the full lifecycle: create a Run, fetch or load posts, truncate,
    /// fan out analysis, tally, and finalize the Run (schema is ensured at
    /// store-connection time, not here). On any failure the Run is still
    /// recorded as `failed` before the error is re-raised.
    pub async fn run(
        &self,
        subreddits: &[String],
        fetch_new: bool,
        process_limit: Option<u32>,
    ) -> Result<PipelineResult> {
        let run_id = self.store.create_run(subreddits).await?;
        info!(run_id, fetch_new, "run_started");

        match self
            .run_inner(run_id, subreddits, fetch_new, process_limit)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(run_id, error = %e, "run_failed");
                let _ = self
                    .store
                    .update_run(run_id, 0, 0, 0, 0, 0, 1, RunStatus::Failed)
                    .await;
                Err(e)
            }
        }
    }

    /// Fetch and persist posts only; does not create a Run or analyze
    /// anything.
    pub async fn run_fetch_only(&self, subreddits: &[String]) -> Result<i64> {
        let posts = self.fetch_posts(subreddits).await;
        let count = posts.len() as i64;
        self.store.upsert_posts(&posts).await?;
        Ok(count)
    }

    /// Analyze already-fetched unprocessed posts without fetching new ones.
    pub async fn run_process_only(&self, process_limit: Option<u32>) -> Result<PipelineResult> {
        self.run(&[], false, process_limit).await
    }

    async fn fetch_posts(&self, subreddits: &[String]) -> Vec<Post> {
        self.fetcher
            .fetch_all(
                subreddits,
                self.config.default_listing,
                self.config.posts_per_subreddit,
                self.config.top_comments,
                self.config.max_concurrency,
            )
            .await
    }

    async fn run_inner(
        &self,
        run_id: i64,
        subreddits: &[String],
        fetch_new: bool,
        process_limit: Option<u32>,
    ) -> Result<PipelineResult> {
        let posts = if fetch_new {
            let fetched = self.fetch_posts(subreddits).await;
            self.store.upsert_posts(&fetched).await?;
            fetched
        } else {
            self.store
                .get_unprocessed_posts(process_limit.unwrap_or(1000))
                .await?
        };

        let posts_fetched = posts.len() as i64;
        let posts: Vec<Post> = match process_limit {
            Some(limit) => posts.into_iter().take(limit as usize).collect(),
            None => posts,
        };

        if self.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = FuturesUnordered::new();

        for post in posts {
            let sem = semaphore.clone();
            tasks.push(async move {
                if self.is_cancelled() {
                    return (post.id.clone(), None, true);
                }
                let _permit = sem.acquire().await.expect("semaphore not closed");
                match self.analyst.analyze(&post).await {
                    Ok(analysis) => (post.id, Some(analysis), false),
                    Err(e) => {
                        warn!(post_id = %post.id, error = %e, "analysis_failed");
                        (post.id, None, true)
                    }
                }
            });
        }

        let mut posts_analyzed = 0i64;
        let mut signals_saved = 0i64;
        let mut qualified_signals = 0i64;
        let mut not_extractable = 0i64;
        let mut errors = 0i64;

        while let Some((post_id, analysis, errored)) = tasks.next().await {
            if errored {
                errors += 1;
            }
            let Some(analysis) = analysis else {
                continue;
            };
            posts_analyzed += 1;

            if analysis.extraction.extraction_state == ExtractionState::NotExtractable {
                not_extractable += 1;
            }

            match self.store.save_signal(&post_id, &analysis, Some(run_id)).await {
                Ok(_) => {
                    signals_saved += 1;
                    let qualified = analysis.extraction.extraction_state == ExtractionState::Extracted
                        && analysis
                            .score
                            .as_ref()
                            .map(|s| !s.disqualified)
                            .unwrap_or(false);
                    if qualified {
                        qualified_signals += 1;
                    }
                }
                Err(e) => {
                    warn!(post_id, error = %e, "save_signal_failed");
                    errors += 1;
                }
            }
        }

        let top_signals = self.store.get_top_signals_with_posts(10, false).await?;

        self.store
            .update_run(
                run_id,
                posts_fetched,
                posts_analyzed,
                signals_saved,
                qualified_signals,
                not_extractable,
                errors,
                RunStatus::Completed,
            )
            .await?;

        info!(
            run_id,
            posts_fetched, posts_analyzed, signals_saved, errors, "run_completed"
        );

        Ok(PipelineResult {
            run_id,
            posts_fetched,
            posts_analyzed,
            signals_saved,
            errors,
            qualified_signals,
            top_signals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Listing;
    use crate::transport::Transport;

    fn unextracted(id: &str) -> Post {
        Post {
            id: id.to_string(),
            subreddit: "test".into(),
            title: "title".into(),
            body: "body".into(),
            created_utc: 0,
            score: 10,
            num_comments: 0,
            url: None,
            permalink: None,
            top_comments: vec![],
        }
    }

    #[tokio::test]
    async fn run_process_only_with_no_posts_completes_the_run() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        let fetcher = SourceFetcher::new(Transport::new("test-agent").unwrap());
        let analyst = Analyst::new("test-key", "gpt-4o");
        let orchestrator = Orchestrator::new(store, fetcher, analyst, Config::default());

        let result = orchestrator.run_process_only(None).await.unwrap();
        assert_eq!(result.posts_fetched, 0);
        assert_eq!(result.posts_analyzed, 0);
        assert_eq!(result.signals_saved, 0);
        assert_eq!(result.errors, 0);
    }

    #[tokio::test]
    async fn cancelled_run_still_finalizes_as_failed() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store.upsert_posts(&[unextracted("p1")]).await.unwrap();

        let fetcher = SourceFetcher::new(Transport::new("test-agent").unwrap());
        let analyst = Analyst::new("test-key", "gpt-4o");
        let cancel = Arc::new(AtomicBool::new(true));
        let orchestrator = Orchestrator::new(store, fetcher, analyst, Config::default())
            .with_cancellation(cancel);

        let err = orchestrator.run(&[], false, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));

        let run = orchestrator.store.get_run(1).await.unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[test]
    fn listing_default_matches_config_default() {
        assert_eq!(Config::default().default_listing, Listing::New);
    }
}
