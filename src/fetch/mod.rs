//! Source Fetcher: RSS listing and per-post JSON comment scraping.
//!
//! Each subreddit fetch runs under a shared bounded semaphore (the fetcher's
//! half of the two semaphores in the concurrency model; the orchestrator
//! owns the other). Comment scraping additionally takes a polite
//! inter-request delay while still holding the permit, intentionally
//! throttling request rate rather than just limiting concurrency.

pub mod html;

use crate::error::{CoreError, Result};
use crate::model::{Listing, Post};
use crate::transport::{Classified, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Polite delay between per-post comment-scrape requests, taken while
/// holding the fetcher's semaphore permit.
const POLITE_DELAY: Duration = Duration::from_millis(500);

const REDDIT_BASE: &str = "https://www.reddit.com";

pub struct SourceFetcher {
    transport: Arc<Transport>,
    base_url: String,
}

impl SourceFetcher {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
            base_url: REDDIT_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(transport: Transport, base_url: impl Into<String>) -> Self {
        Self {
            transport: Arc::new(transport),
            base_url: base_url.into(),
        }
    }

    /// Fetch posts (and, optionally, their top comments) from every
    /// subreddit, preserving listing order within a subreddit and
    /// subreddit order across the concatenation.
    pub async fn fetch_all(
        &self,
        subreddits: &[String],
        listing: Listing,
        limit: u32,
        top_comments: u32,
        concurrency: usize,
    ) -> Vec<Post> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let tasks = subreddits.iter().map(|sr| {
            let sem = semaphore.clone();
            let sr = sr.clone();
            async move {
                self.fetch_subreddit(&sr, listing, limit, top_comments, &sem)
                    .await
            }
        });

        // Subreddits run concurrently, each internally gated by `semaphore`;
        // subreddit order is preserved in the concatenation below regardless
        // of completion order, since `join_all` returns results in input order.
        let per_subreddit = futures::future::join_all(tasks).await;

        per_subreddit.into_iter().flatten().collect()
    }

    /// Each network operation (the listing fetch, and each per-post comment
    /// fetch) acquires its own permit and releases it promptly, so one
    /// subreddit with many posts never monopolizes the whole semaphore.
    async fn fetch_subreddit(
        &self,
        subreddit: &str,
        listing: Listing,
        limit: u32,
        top_comments: u32,
        semaphore: &Arc<Semaphore>,
    ) -> Vec<Post> {
        if limit == 0 {
            return Vec::new();
        }

        let url = format!(
            "{}/r/{}/{}.rss",
            self.base_url,
            subreddit,
            listing.as_str()
        );

        let mut posts = {
            let _permit = semaphore.acquire().await.expect("semaphore not closed");
            match self.fetch_listing(&url, subreddit, limit).await {
                Ok(posts) => posts,
                Err(e) => {
                    warn!(subreddit, error = %e, "subreddit_fetch_failed");
                    return Vec::new();
                }
            }
        };

        if top_comments > 0 {
            for post in &mut posts {
                let _permit = semaphore.acquire().await.expect("semaphore not closed");
                // Delay is taken while holding the permit, intentionally
                // throttling request rate rather than just concurrency.
                tokio::time::sleep(POLITE_DELAY).await;
                match self.fetch_comments(post, top_comments).await {
                    Ok(comments) => post.top_comments = comments,
                    Err(e) => {
                        warn!(post_id = %post.id, error = %e, "comment_scrape_failed");
                        post.top_comments = Vec::new();
                    }
                }
            }
        }

        posts
    }

    /// Parse one subreddit's RSS/Atom listing into posts, truncated to
    /// `limit`.
    async fn fetch_listing(&self, url: &str, subreddit: &str, limit: u32) -> Result<Vec<Post>> {
        let body = self.get_text(url).await?;
        let feed = feed_rs::parser::parse(body.as_bytes())
            .map_err(|e| CoreError::Parse {
                context: "rss_listing".into(),
                message: e.to_string(),
            })?;

        let mut posts = Vec::new();
        for entry in feed.entries {
            if posts.len() >= limit as usize {
                break;
            }
            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                continue;
            };
            let Some(id) = extract_post_id(&link) else {
                continue;
            };

            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_default();
            let raw_body = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();
            let body = html::clean_html(&raw_body);
            let created_utc = entry
                .published
                .or(entry.updated)
                .map(|t| t.timestamp())
                .unwrap_or(0);

            posts.push(Post {
                id,
                subreddit: subreddit.to_string(),
                title,
                body,
                created_utc,
                score: 0,
                num_comments: 0,
                url: Some(link.clone()),
                permalink: Some(link),
                top_comments: Vec::new(),
            });
        }

        Ok(posts)
    }

    /// Re-read a post's JSON comment page and return comments
    /// `[start_index, start_index + limit)` from the filtered stream.
    pub async fn fetch_more_comments(
        &self,
        post: &Post,
        start_index: usize,
        limit: usize,
    ) -> Result<Vec<String>> {
        let all = self.fetch_comments(post, (start_index + limit) as u32).await?;
        Ok(all
            .into_iter()
            .skip(start_index)
            .take(limit)
            .collect())
    }

    async fn fetch_comments(&self, post: &Post, top_comments: u32) -> Result<Vec<String>> {
        let Some(permalink) = &post.permalink else {
            return Ok(Vec::new());
        };
        let url = format!("{}.json", permalink.trim_end_matches('/'));
        let body = self.get_text(&url).await?;
        let value: Value = serde_json::from_str(&body).map_err(|e| CoreError::Parse {
            context: "comment_json".into(),
            message: e.to_string(),
        })?;

        let children = value
            .get(1)
            .and_then(|v| v.get("data"))
            .and_then(|v| v.get("children"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut comments = Vec::new();
        for child in children {
            if comments.len() >= top_comments as usize {
                break;
            }
            if child.get("kind").and_then(|k| k.as_str()) != Some("t1") {
                continue;
            }
            let Some(raw_body) = child
                .get("data")
                .and_then(|d| d.get("body"))
                .and_then(|b| b.as_str())
            else {
                continue;
            };
            if raw_body == "[deleted]" || raw_body == "[removed]" {
                continue;
            }
            comments.push(html::clean_html(raw_body));
        }

        Ok(comments)
    }

    /// Search within a subreddit for posts matching `query`.
    pub async fn search_related_posts(
        &self,
        subreddit: &str,
        query: &str,
        limit: u32,
    ) -> Vec<Post> {
        let url = format!(
            "{}/r/{}/search.rss?q={}&restrict_sr=on&sort=relevance",
            self.base_url,
            subreddit,
            urlencode(query)
        );
        match self.fetch_listing(&url, subreddit, limit).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(subreddit, query, error = %e, "search_failed");
                Vec::new()
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        match self.transport.get(url).await? {
            Classified::Success(resp) => resp.text().await.map_err(CoreError::Request),
            Classified::AccessDenied { status } => Err(CoreError::Access { status }),
            Classified::RateLimited { .. } => Err(CoreError::HttpError {
                status: 429,
                body: String::new(),
                retry_after: None,
            }),
            Classified::ServerError { status } => Err(CoreError::HttpError {
                status,
                body: String::new(),
                retry_after: None,
            }),
            Classified::Other { status, body } => Err(CoreError::HttpError {
                status,
                body,
                retry_after: None,
            }),
        }
    }
}

/// Extract a post id from a permalink matching `/comments/{id}/`.
fn extract_post_id(link: &str) -> Option<String> {
    let marker = "/comments/";
    let idx = link.find(marker)?;
    let rest = &link[idx + marker.len()..];
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if id.is_empty() {
        None
    } else {
        debug!(id, "extracted_post_id");
        Some(id)
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_permalink() {
        assert_eq!(
            extract_post_id("https://www.reddit.com/r/test/comments/t3_12345/title/"),
            Some("t3_12345".to_string())
        );
    }

    #[test]
    fn returns_none_without_comments_marker() {
        assert_eq!(extract_post_id("https://www.reddit.com/r/test/"), None);
    }

    #[test]
    fn urlencode_escapes_spaces_and_special_chars() {
        assert_eq!(urlencode("checkout abandonment"), "checkout%20abandonment");
    }

    #[tokio::test]
    async fn fetch_all_with_zero_limit_returns_no_posts() {
        let transport = Transport::new("test-agent").unwrap();
        let fetcher = SourceFetcher::new(transport);
        let posts = fetcher
            .fetch_all(&["test".to_string()], Listing::New, 0, 0, 1)
            .await;
        assert!(posts.is_empty());
    }
}
