//! Signal Store: relational persistence of posts, signals, runs, clusters,
//! source sets, and watchlists.
//!
//! Grounded on the row-struct + `FromRow` + `into_domain()` conversion
//! pattern used for `sqlx`-backed stores in the broader pack (private `*Row`
//! structs that know the column layout, kept separate from the public
//! domain types in [`crate::model`]).

use crate::error::{CoreError, Result};
use crate::model::{
    AlertMatch, Analysis, Cluster, ClusterItem, CompetitorNote, DistributionWedge,
    EvidenceSignal, ExtractionState, ExtractionType, Post, Run, RunStatus, Score, Signal,
    SignalSummaryFields, SourceSet, TopSignal, Watchlist,
};
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

const SCHEMA: &str = include_str!("schema.sql");

pub struct SignalStore {
    pool: SqlitePool,
}

impl SignalStore {
    /// Connect to (creating if absent) the sqlite database at `path`, and
    /// ensure the schema exists.
    pub async fn connect(path: &str) -> Result<Self> {
        let url = format!("sqlite://{path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// In-memory store, for tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA.split(';') {
            let statement = statement.trim();
            if statement.is_empty() {
                continue;
            }
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Insert-or-replace posts by id. Never resets an existing row's
    /// `processed` flag.
    pub async fn upsert_posts(&self, posts: &[Post]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for post in posts {
            let top_comments = serde_json::to_string(&post.top_comments)?;
            sqlx::query(
                r#"
                INSERT INTO posts (id, subreddit, title, body, created_utc, score,
                    num_comments, url, permalink, top_comments, fetched_at, processed)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
                ON CONFLICT(id) DO UPDATE SET
                    subreddit = excluded.subreddit,
                    title = excluded.title,
                    body = excluded.body,
                    created_utc = excluded.created_utc,
                    score = excluded.score,
                    num_comments = excluded.num_comments,
                    url = excluded.url,
                    permalink = excluded.permalink,
                    top_comments = excluded.top_comments,
                    fetched_at = excluded.fetched_at
                "#,
            )
            .bind(&post.id)
            .bind(&post.subreddit)
            .bind(&post.title)
            .bind(&post.body)
            .bind(post.created_utc)
            .bind(post.score)
            .bind(post.num_comments)
            .bind(&post.url)
            .bind(&post.permalink)
            .bind(top_comments)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Posts with `processed = 0`, ordered by popularity descending,
    /// capped to `limit`.
    pub async fn get_unprocessed_posts(&self, limit: u32) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT id, subreddit, title, body, created_utc, score, num_comments, url, \
             permalink, top_comments FROM posts WHERE processed = 0 \
             ORDER BY score DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_post).collect()
    }

    /// Insert a signal row and, in the same transaction, mark the post
    /// processed. Fails on uniqueness violation of (post_id, run_id).
    pub async fn save_signal(
        &self,
        post_id: &str,
        analysis: &Analysis,
        run_id: Option<i64>,
    ) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        let extraction = &analysis.extraction;
        let raw_extraction = serde_json::to_string(extraction)?;
        let raw_score = analysis
            .score
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // `disqualified`/`disqualify_reasons` come from the score whenever a
        // score is present, regardless of extraction state (a `disqualified`
        // state still carries a score with `disqualified = true`).
        let (disqualified, disqualify_reasons) = match &analysis.score {
            Some(score) => (
                score.disqualified,
                serde_json::to_string(&score.disqualify_reasons)?,
            ),
            None => (false, "[]".to_string()),
        };

        // Invariant (b): non-extracted signals persist zeroed/null dimension
        // and total_score fields, even if the analyst's score is present.
        let (practicality, profitability, distribution, competition, moat, total_score,
            confidence, wedge, wedge_detail, landscape, why, next_steps) = match &analysis.score {
            Some(score) if extraction.extraction_state == ExtractionState::Extracted => (
                Some(score.practicality as i64),
                Some(score.profitability as i64),
                Some(score.distribution as i64),
                Some(score.competition as i64),
                Some(score.moat as i64),
                score.total(),
                Some(score.confidence),
                Some(wedge_str(&score.distribution_wedge)),
                Some(score.distribution_wedge_detail.clone()),
                serde_json::to_string(&score.competition_landscape)?,
                serde_json::to_string(&score.why)?,
                serde_json::to_string(&score.next_validation_steps)?,
            ),
            _ => (
                None,
                None,
                None,
                None,
                None,
                0,
                None,
                None,
                None,
                "[]".to_string(),
                "[]".to_string(),
                "[]".to_string(),
            ),
        };

        let evidence = serde_json::to_string(&extraction.evidence)?;
        let risk_flags = serde_json::to_string(&extraction.risk_flags)?;

        let id: i64 = sqlx::query(
            r#"
            INSERT INTO signals (
                post_id, run_id, extraction_state, extraction_type, not_extractable_reason,
                signal_summary, target_user, pain_point, proposed_solution, evidence,
                evidence_strength, evidence_strength_reason, risk_flags,
                disqualified, disqualify_reasons, practicality, profitability, distribution,
                competition, moat, total_score, confidence, distribution_wedge,
                distribution_wedge_detail, competition_landscape, why, next_validation_steps,
                created_at, raw_extraction, raw_score
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post_id)
        .bind(run_id)
        .bind(extraction.extraction_state.as_str())
        .bind(extraction_type_str(extraction.extraction_type))
        .bind(&extraction.not_extractable_reason)
        .bind(&extraction.signal_summary)
        .bind(&extraction.target_user)
        .bind(&extraction.pain_point)
        .bind(&extraction.proposed_solution)
        .bind(evidence)
        .bind(extraction.evidence_strength as i64)
        .bind(&extraction.evidence_strength_reason)
        .bind(risk_flags)
        .bind(disqualified)
        .bind(disqualify_reasons)
        .bind(practicality)
        .bind(profitability)
        .bind(distribution)
        .bind(competition)
        .bind(moat)
        .bind(total_score)
        .bind(confidence)
        .bind(wedge)
        .bind(wedge_detail)
        .bind(landscape)
        .bind(why)
        .bind(next_steps)
        .bind(&now)
        .bind(raw_extraction)
        .bind(raw_score)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => CoreError::Persistence(e),
            _ => CoreError::Persistence(e),
        })?
        .last_insert_rowid();

        sqlx::query("UPDATE posts SET processed = 1 WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    /// Top signals by total_score descending, optionally including
    /// disqualified ones.
    pub async fn get_top_signals(
        &self,
        limit: u32,
        include_disqualified: bool,
    ) -> Result<Vec<Signal>> {
        let query = if include_disqualified {
            "SELECT * FROM signals ORDER BY total_score DESC LIMIT ?"
        } else {
            "SELECT * FROM signals WHERE disqualified = 0 ORDER BY total_score DESC LIMIT ?"
        };
        let rows = sqlx::query(query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_signal).collect()
    }

    /// Top signals joined to their post, for [`crate::model::PipelineResult`].
    pub async fn get_top_signals_with_posts(
        &self,
        limit: u32,
        include_disqualified: bool,
    ) -> Result<Vec<TopSignal>> {
        let query = if include_disqualified {
            "SELECT s.*, p.title AS post_title, p.url AS post_url FROM signals s \
             JOIN posts p ON p.id = s.post_id ORDER BY s.total_score DESC LIMIT ?"
        } else {
            "SELECT s.*, p.title AS post_title, p.url AS post_url FROM signals s \
             JOIN posts p ON p.id = s.post_id WHERE s.disqualified = 0 \
             ORDER BY s.total_score DESC LIMIT ?"
        };
        let rows = sqlx::query(query)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let signal = row_to_signal(row)?;
                let post_title: String = row.try_get("post_title")?;
                let post_url: Option<String> = row.try_get("post_url")?;
                Ok(TopSignal {
                    signal: SignalSummaryFields::from(&signal),
                    post_title,
                    post_url,
                })
            })
            .collect()
    }

    pub async fn create_run(&self, subreddits: &[String]) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let subreddits_json = serde_json::to_string(subreddits)?;
        let id = sqlx::query(
            "INSERT INTO runs (started_at, subreddits, status) VALUES (?, ?, 'running')",
        )
        .bind(&now)
        .bind(subreddits_json)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_run(
        &self,
        run_id: i64,
        posts_fetched: i64,
        posts_analyzed: i64,
        signals_saved: i64,
        qualified_signals: i64,
        not_extractable: i64,
        errors: i64,
        status: RunStatus,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE runs SET completed_at = ?, posts_fetched = ?, posts_analyzed = ?,
                signals_saved = ?, qualified_signals = ?, not_extractable = ?, errors = ?,
                status = ? WHERE id = ?
            "#,
        )
        .bind(&now)
        .bind(posts_fetched)
        .bind(posts_analyzed)
        .bind(signals_saved)
        .bind(qualified_signals)
        .bind(not_extractable)
        .bind(errors)
        .bind(status.as_str())
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_run(&self, run_id: i64) -> Result<Option<Run>> {
        let row = sqlx::query("SELECT * FROM runs WHERE id = ?")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_run).transpose()
    }

    /// Signals whose `cluster_id` is null, not disqualified, created within
    /// the last `days` days, optionally scoped to one subreddit.
    pub async fn get_unclustered_pain_points(
        &self,
        subreddit: Option<&str>,
        days: i64,
    ) -> Result<Vec<Signal>> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let rows = if let Some(sr) = subreddit {
            sqlx::query(
                r#"
                SELECT s.* FROM signals s JOIN posts p ON p.id = s.post_id
                WHERE s.cluster_id IS NULL AND s.disqualified = 0 AND s.created_at >= ?
                    AND p.subreddit = ?
                "#,
            )
            .bind(&cutoff)
            .bind(sr)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT * FROM signals WHERE cluster_id IS NULL AND disqualified = 0 \
                 AND created_at >= ?",
            )
            .bind(&cutoff)
            .fetch_all(&self.pool)
            .await?
        };
        rows.iter().map(row_to_signal).collect()
    }

    /// Same selection as [`Self::get_unclustered_pain_points`], joined to the
    /// owning post and shaped as [`ClusterItem`] for the clusterer.
    pub async fn get_unclustered_cluster_items(
        &self,
        subreddit: Option<&str>,
        days: i64,
    ) -> Result<Vec<ClusterItem>> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let rows = if let Some(sr) = subreddit {
            sqlx::query(
                r#"
                SELECT s.*, p.subreddit AS post_subreddit, p.permalink AS post_permalink
                FROM signals s JOIN posts p ON p.id = s.post_id
                WHERE s.cluster_id IS NULL AND s.disqualified = 0 AND s.created_at >= ?
                    AND p.subreddit = ?
                "#,
            )
            .bind(&cutoff)
            .bind(sr)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                SELECT s.*, p.subreddit AS post_subreddit, p.permalink AS post_permalink
                FROM signals s JOIN posts p ON p.id = s.post_id
                WHERE s.cluster_id IS NULL AND s.disqualified = 0 AND s.created_at >= ?
                "#,
            )
            .bind(&cutoff)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter()
            .map(|row| {
                let signal = row_to_signal(row)?;
                let subreddit: String = row.try_get("post_subreddit")?;
                let url: Option<String> = row.try_get("post_permalink")?;
                Ok(ClusterItem {
                    id: signal.id,
                    summary: signal.extraction.signal_summary.clone(),
                    pain_point: signal.extraction.pain_point.clone(),
                    subreddit,
                    url: url.unwrap_or_default(),
                    evidence: signal.extraction.evidence.clone(),
                })
            })
            .collect()
    }

    /// Insert clusters with deterministic id `{week_start}_{slug}_{count}`,
    /// disambiguating collisions within this batch with a `-2`, `-3`, ...
    /// suffix, and set `cluster_id` on each referenced signal in the same
    /// transaction.
    pub async fn save_clusters(&self, clusters: &[Cluster], week_start: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();
        let mut seen_ids = std::collections::HashSet::new();

        for cluster in clusters {
            let mut id = cluster_id(week_start, &cluster.title, cluster.signal_ids.len());
            let mut suffix = 2;
            while seen_ids.contains(&id) {
                id = format!(
                    "{}-{}",
                    cluster_id(week_start, &cluster.title, cluster.signal_ids.len()),
                    suffix
                );
                suffix += 1;
            }
            seen_ids.insert(id.clone());

            let quotes = serde_json::to_string(&cluster.quotes)?;
            let urls = serde_json::to_string(&cluster.urls)?;

            sqlx::query(
                r#"
                INSERT INTO clusters (id, title, summary, week_start, target_audience,
                    why_it_matters, quotes, urls, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&cluster.title)
            .bind(&cluster.summary)
            .bind(week_start)
            .bind(&cluster.target_audience)
            .bind(&cluster.why_it_matters)
            .bind(quotes)
            .bind(urls)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            for signal_id in &cluster.signal_ids {
                sqlx::query("UPDATE signals SET cluster_id = ? WHERE id = ?")
                    .bind(&id)
                    .bind(signal_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    // --- Source sets ---

    pub async fn create_source_set(&self, set: &SourceSet) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let subreddits = serde_json::to_string(&set.subreddits)?;
        let id = sqlx::query(
            r#"
            INSERT INTO source_sets (name, description, preset_key, subreddits, listing,
                limit_per_sub, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&set.name)
        .bind(&set.description)
        .bind(&set.preset_key)
        .bind(subreddits)
        .bind(&set.listing)
        .bind(set.limit_per_sub)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn get_source_set_by_preset(&self, preset_key: &str) -> Result<Option<SourceSet>> {
        let row = sqlx::query("SELECT * FROM source_sets WHERE preset_key = ? AND is_active = 1")
            .bind(preset_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_source_set).transpose()
    }

    pub async fn deactivate_source_set(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE source_sets SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Watchlists ---

    pub async fn create_watchlist(&self, watchlist: &Watchlist) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let keywords = serde_json::to_string(&watchlist.keywords)?;
        let subreddits = watchlist
            .subreddits
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let id = sqlx::query(
            r#"
            INSERT INTO watchlists (name, keywords, subreddits, notification_email,
                notification_webhook, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&watchlist.name)
        .bind(keywords)
        .bind(subreddits)
        .bind(&watchlist.notification_email)
        .bind(&watchlist.notification_webhook)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn get_active_watchlists(&self) -> Result<Vec<Watchlist>> {
        let rows = sqlx::query("SELECT * FROM watchlists WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_watchlist).collect()
    }

    pub async fn deactivate_watchlist(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE watchlists SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a (watchlist, signal, keyword) match, idempotently: an
    /// existing pair is not duplicated.
    pub async fn record_alert_match(
        &self,
        watchlist_id: i64,
        signal_id: i64,
        keyword: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO alert_matches (watchlist_id, signal_id, keyword_matched, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(watchlist_id, signal_id) DO NOTHING
            "#,
        )
        .bind(watchlist_id)
        .bind(signal_id)
        .bind(keyword)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Signals created within the last `since_hours` hours, not
    /// disqualified, with their post's title and subreddit for watchlist
    /// matching.
    pub async fn get_recent_signals(&self, since_hours: i64) -> Result<Vec<(Signal, String, String)>> {
        let cutoff = (Utc::now() - chrono::Duration::hours(since_hours)).to_rfc3339();
        let rows = sqlx::query(
            r#"
            SELECT s.*, p.subreddit as post_subreddit, p.title as post_title
            FROM signals s JOIN posts p ON p.id = s.post_id
            WHERE s.disqualified = 0 AND s.created_at >= ?
            "#,
        )
        .bind(&cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let signal = row_to_signal(row)?;
                let post_title: String = row.try_get("post_title")?;
                let post_subreddit: String = row.try_get("post_subreddit")?;
                Ok((signal, post_title, post_subreddit))
            })
            .collect()
    }
}

fn wedge_str(wedge: &DistributionWedge) -> String {
    match wedge {
        DistributionWedge::Ecosystem => "ecosystem",
        DistributionWedge::PartnerChannel => "partner_channel",
        DistributionWedge::Seo => "seo",
        DistributionWedge::InfluencerAffiliate => "influencer_affiliate",
        DistributionWedge::Community => "community",
        DistributionWedge::ProductLed => "product_led",
    }
    .to_string()
}

fn wedge_from_str(s: &str) -> DistributionWedge {
    match s {
        "partner_channel" => DistributionWedge::PartnerChannel,
        "seo" => DistributionWedge::Seo,
        "influencer_affiliate" => DistributionWedge::InfluencerAffiliate,
        "community" => DistributionWedge::Community,
        "product_led" => DistributionWedge::ProductLed,
        _ => DistributionWedge::Ecosystem,
    }
}

fn extraction_type_str(t: ExtractionType) -> &'static str {
    match t {
        ExtractionType::Idea => "idea",
        ExtractionType::Pain => "pain",
    }
}

fn extraction_type_from_str(s: &str) -> ExtractionType {
    match s {
        "pain" => ExtractionType::Pain,
        _ => ExtractionType::Idea,
    }
}

/// Deterministic cluster id: week-start + title slug (first 10 chars) +
/// signal count.
fn cluster_id(week_start: &str, title: &str, signal_count: usize) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .take(10)
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();
    format!("{week_start}_{slug}_{signal_count}")
}

fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let top_comments_json: Option<String> = row.try_get("top_comments")?;
    let top_comments = top_comments_json
        .map(|s| serde_json::from_str(&s))
        .transpose()?
        .unwrap_or_default();
    Ok(Post {
        id: row.try_get("id")?,
        subreddit: row.try_get("subreddit")?,
        title: row.try_get("title")?,
        body: row.try_get::<Option<String>, _>("body")?.unwrap_or_default(),
        created_utc: row.try_get("created_utc")?,
        score: row.try_get("score")?,
        num_comments: row.try_get("num_comments")?,
        url: row.try_get("url")?,
        permalink: row.try_get("permalink")?,
        top_comments,
    })
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<Run> {
    let subreddits_json: Option<String> = row.try_get("subreddits")?;
    let subreddits = subreddits_json
        .map(|s| serde_json::from_str(&s))
        .transpose()?
        .unwrap_or_default();
    let status: String = row.try_get("status")?;
    Ok(Run {
        id: row.try_get("id")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        subreddits,
        posts_fetched: row.try_get("posts_fetched")?,
        posts_analyzed: row.try_get("posts_analyzed")?,
        signals_saved: row.try_get("signals_saved")?,
        qualified_signals: row.try_get("qualified_signals")?,
        not_extractable: row.try_get("not_extractable")?,
        errors: row.try_get("errors")?,
        status: RunStatus::from_str(&status),
    })
}

fn row_to_signal(row: &sqlx::sqlite::SqliteRow) -> Result<Signal> {
    let extraction_state: String = row.try_get("extraction_state")?;
    let extraction_type: String = row.try_get("extraction_type")?;
    let evidence_json: Option<String> = row.try_get("evidence")?;
    let evidence: Vec<EvidenceSignal> = evidence_json
        .map(|s| serde_json::from_str(&s))
        .transpose()?
        .unwrap_or_default();
    let risk_flags_json: Option<String> = row.try_get("risk_flags")?;
    let risk_flags = risk_flags_json
        .map(|s| serde_json::from_str(&s))
        .transpose()?
        .unwrap_or_default();

    let extraction = crate::model::Extraction {
        extraction_state: ExtractionState::from_str(&extraction_state),
        extraction_type: extraction_type_from_str(&extraction_type),
        signal_summary: row.try_get("signal_summary")?,
        target_user: row.try_get::<Option<String>, _>("target_user")?.unwrap_or_default(),
        pain_point: row.try_get::<Option<String>, _>("pain_point")?.unwrap_or_default(),
        proposed_solution: row
            .try_get::<Option<String>, _>("proposed_solution")?
            .unwrap_or_default(),
        evidence,
        evidence_strength: row.try_get::<i64, _>("evidence_strength")? as u8,
        evidence_strength_reason: row
            .try_get::<Option<String>, _>("evidence_strength_reason")?
            .unwrap_or_default(),
        risk_flags,
        not_extractable_reason: row.try_get("not_extractable_reason")?,
    };

    let disqualified: i64 = row.try_get("disqualified")?;
    let disqualified = disqualified != 0;

    let score = if extraction.extraction_state == ExtractionState::Extracted {
        let practicality: Option<i64> = row.try_get("practicality")?;
        practicality.map(|_| -> Result<Score> {
            let landscape_json: Option<String> = row.try_get("competition_landscape")?;
            let competition_landscape: Vec<CompetitorNote> = landscape_json
                .map(|s| serde_json::from_str(&s))
                .transpose()?
                .unwrap_or_default();
            let why_json: Option<String> = row.try_get("why")?;
            let why = why_json
                .map(|s| serde_json::from_str(&s))
                .transpose()?
                .unwrap_or_default();
            let steps_json: Option<String> = row.try_get("next_validation_steps")?;
            let next_validation_steps = steps_json
                .map(|s| serde_json::from_str(&s))
                .transpose()?
                .unwrap_or_default();
            let reasons_json: Option<String> = row.try_get("disqualify_reasons")?;
            let disqualify_reasons = reasons_json
                .map(|s| serde_json::from_str(&s))
                .transpose()?
                .unwrap_or_default();
            let wedge: Option<String> = row.try_get("distribution_wedge")?;

            Ok(Score {
                disqualified,
                disqualify_reasons,
                practicality: row.try_get::<Option<i64>, _>("practicality")?.unwrap_or(0) as u8,
                profitability: row.try_get::<Option<i64>, _>("profitability")?.unwrap_or(0) as u8,
                distribution: row.try_get::<Option<i64>, _>("distribution")?.unwrap_or(0) as u8,
                competition: row.try_get::<Option<i64>, _>("competition")?.unwrap_or(0) as u8,
                moat: row.try_get::<Option<i64>, _>("moat")?.unwrap_or(0) as u8,
                confidence: row.try_get::<Option<f64>, _>("confidence")?.unwrap_or(0.0),
                distribution_wedge: wedge_from_str(wedge.as_deref().unwrap_or("ecosystem")),
                distribution_wedge_detail: row
                    .try_get::<Option<String>, _>("distribution_wedge_detail")?
                    .unwrap_or_default(),
                competition_landscape,
                why,
                next_validation_steps,
            })
        }).transpose()?
    } else {
        None
    };

    Ok(Signal {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        run_id: row.try_get("run_id")?,
        cluster_id: row.try_get("cluster_id")?,
        extraction,
        score,
        disqualified,
        total_score: row.try_get("total_score")?,
        created_at: row.try_get("created_at")?,
        raw_extraction: row.try_get::<Option<String>, _>("raw_extraction")?.unwrap_or_default(),
        raw_score: row.try_get("raw_score")?,
    })
}

fn row_to_source_set(row: &sqlx::sqlite::SqliteRow) -> Result<SourceSet> {
    let subreddits_json: String = row.try_get("subreddits")?;
    let subreddits = serde_json::from_str(&subreddits_json)?;
    let is_active: i64 = row.try_get("is_active")?;
    Ok(SourceSet {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        preset_key: row.try_get("preset_key")?,
        subreddits,
        listing: row.try_get("listing")?,
        limit_per_sub: row.try_get("limit_per_sub")?,
        is_active: is_active != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_watchlist(row: &sqlx::sqlite::SqliteRow) -> Result<Watchlist> {
    let keywords_json: String = row.try_get("keywords")?;
    let keywords = serde_json::from_str(&keywords_json)?;
    let subreddits_json: Option<String> = row.try_get("subreddits")?;
    let subreddits = subreddits_json.map(|s| serde_json::from_str(&s)).transpose()?;
    let is_active: i64 = row.try_get("is_active")?;
    Ok(Watchlist {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        keywords,
        subreddits,
        notification_email: row.try_get("notification_email")?,
        notification_webhook: row.try_get("notification_webhook")?,
        is_active: is_active != 0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_checked_at: row.try_get("last_checked_at")?,
        total_matches: row.try_get("total_matches")?,
    })
}

#[allow(dead_code)]
fn row_to_alert_match(row: &sqlx::sqlite::SqliteRow) -> Result<AlertMatch> {
    let notified: i64 = row.try_get("notified")?;
    Ok(AlertMatch {
        id: row.try_get("id")?,
        watchlist_id: row.try_get("watchlist_id")?,
        signal_id: row.try_get("signal_id")?,
        keyword_matched: row.try_get("keyword_matched")?,
        created_at: row.try_get("created_at")?,
        notified: notified != 0,
        notified_at: row.try_get("notified_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Extraction;

    fn sample_post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            subreddit: "test".to_string(),
            title: "Test Post".to_string(),
            body: "Test Body".to_string(),
            created_utc: 0,
            score: 10,
            num_comments: 0,
            url: Some("https://reddit.com/...".to_string()),
            permalink: Some("https://reddit.com/r/test/comments/abc/title".to_string()),
            top_comments: vec![],
        }
    }

    fn extracted_analysis(summary: &str) -> Analysis {
        Analysis {
            extraction: Extraction {
                extraction_state: ExtractionState::Extracted,
                extraction_type: ExtractionType::Idea,
                signal_summary: summary.to_string(),
                target_user: "indie devs".to_string(),
                pain_point: "no tool for X".to_string(),
                proposed_solution: "build X".to_string(),
                evidence: vec![],
                evidence_strength: 8,
                evidence_strength_reason: "strong".to_string(),
                risk_flags: vec![],
                not_extractable_reason: None,
            },
            score: Some(Score {
                disqualified: false,
                disqualify_reasons: vec![],
                practicality: 8,
                profitability: 8,
                distribution: 8,
                competition: 5,
                moat: 5,
                confidence: 0.9,
                distribution_wedge: DistributionWedge::Seo,
                distribution_wedge_detail: "SEO wedge".to_string(),
                competition_landscape: vec![],
                why: vec![],
                next_validation_steps: vec![],
            }),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_unprocessed_preserves_popularity_order() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        let mut low = sample_post("low");
        low.score = 1;
        let mut high = sample_post("high");
        high.score = 100;
        store.upsert_posts(&[low, high]).await.unwrap();

        let unprocessed = store.get_unprocessed_posts(10).await.unwrap();
        assert_eq!(unprocessed.len(), 2);
        assert_eq!(unprocessed[0].id, "high");
        assert_eq!(unprocessed[1].id, "low");
    }

    #[tokio::test]
    async fn save_signal_marks_post_processed() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store.upsert_posts(&[sample_post("p1")]).await.unwrap();

        let run_id = store.create_run(&["test".to_string()]).await.unwrap();
        store
            .save_signal("p1", &extracted_analysis("Needs tool for X"), Some(run_id))
            .await
            .unwrap();

        let unprocessed = store.get_unprocessed_posts(10).await.unwrap();
        assert!(unprocessed.is_empty());
    }

    #[tokio::test]
    async fn save_signal_total_score_matches_dimension_sum() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store.upsert_posts(&[sample_post("p1")]).await.unwrap();
        let run_id = store.create_run(&["test".to_string()]).await.unwrap();
        store
            .save_signal("p1", &extracted_analysis("Needs tool for X"), Some(run_id))
            .await
            .unwrap();

        let top = store.get_top_signals(10, false).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].total_score, 34);
    }

    #[tokio::test]
    async fn not_extractable_signal_has_zeroed_total_score() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store.upsert_posts(&[sample_post("p1")]).await.unwrap();
        let run_id = store.create_run(&["test".to_string()]).await.unwrap();

        let analysis = Analysis {
            extraction: Extraction {
                extraction_state: ExtractionState::NotExtractable,
                extraction_type: ExtractionType::Idea,
                signal_summary: "No viable signal".to_string(),
                target_user: String::new(),
                pain_point: String::new(),
                proposed_solution: String::new(),
                evidence: vec![],
                evidence_strength: 0,
                evidence_strength_reason: String::new(),
                risk_flags: vec![],
                not_extractable_reason: Some("meta post".to_string()),
            },
            score: None,
        };
        store.save_signal("p1", &analysis, Some(run_id)).await.unwrap();

        let top = store.get_top_signals(10, true).await.unwrap();
        assert_eq!(top[0].total_score, 0);
        assert!(top[0].score.is_none());
    }

    #[tokio::test]
    async fn duplicate_post_run_pair_fails_uniqueness() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store.upsert_posts(&[sample_post("p1")]).await.unwrap();
        let run_id = store.create_run(&["test".to_string()]).await.unwrap();
        store
            .save_signal("p1", &extracted_analysis("first"), Some(run_id))
            .await
            .unwrap();
        let err = store
            .save_signal("p1", &extracted_analysis("second"), Some(run_id))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn disqualified_signal_excluded_by_default() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store.upsert_posts(&[sample_post("p1")]).await.unwrap();
        let run_id = store.create_run(&["test".to_string()]).await.unwrap();

        let mut analysis = extracted_analysis("scammy idea");
        analysis.extraction.extraction_state = ExtractionState::Disqualified;
        if let Some(score) = &mut analysis.score {
            score.disqualified = true;
            score.disqualify_reasons = vec!["self_promo".to_string()];
        }
        store.save_signal("p1", &analysis, Some(run_id)).await.unwrap();

        let default_top = store.get_top_signals(10, false).await.unwrap();
        assert!(default_top.is_empty());
        let all_top = store.get_top_signals(10, true).await.unwrap();
        assert_eq!(all_top.len(), 1);
        assert!(all_top[0].disqualified);
    }

    #[tokio::test]
    async fn upsert_posts_does_not_reset_processed_flag() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        store.upsert_posts(&[sample_post("p1")]).await.unwrap();
        let run_id = store.create_run(&["test".to_string()]).await.unwrap();
        store
            .save_signal("p1", &extracted_analysis("idea"), Some(run_id))
            .await
            .unwrap();

        // Re-fetch overwrites snapshot fields but must not reset processed.
        store.upsert_posts(&[sample_post("p1")]).await.unwrap();
        let unprocessed = store.get_unprocessed_posts(10).await.unwrap();
        assert!(unprocessed.is_empty());
    }

    #[tokio::test]
    async fn save_clusters_disambiguates_colliding_ids() {
        let store = SignalStore::connect_in_memory().await.unwrap();
        let clusters = vec![
            Cluster {
                id: String::new(),
                title: "Same Title".to_string(),
                summary: "s1".to_string(),
                week_start: "2026-07-20".to_string(),
                target_audience: "devs".to_string(),
                why_it_matters: "because".to_string(),
                signal_ids: vec![],
                quotes: vec![],
                urls: vec![],
                created_at: String::new(),
            },
            Cluster {
                id: String::new(),
                title: "Same Title".to_string(),
                summary: "s2".to_string(),
                week_start: "2026-07-20".to_string(),
                target_audience: "devs".to_string(),
                why_it_matters: "because".to_string(),
                signal_ids: vec![],
                quotes: vec![],
                urls: vec![],
                created_at: String::new(),
            },
        ];
        store.save_clusters(&clusters, "2026-07-20").await.unwrap();
        // No save failure despite both clusters hashing to the same id/count.
    }
}
