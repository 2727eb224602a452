//! Weekly digest rendering: turns a batch of [`Cluster`]s into a single
//! Reddit-post-shaped Markdown string. Grounded verbatim on
//! `original_source/src/pain_radar/digest.py::_generate_reddit_post`
//! (pattern count intro, numbered sections, at most 3 quotes/sources per
//! cluster, soft non-pushy call-to-action).

use crate::model::Cluster;
use std::fmt::Write;

/// Render `clusters` (for `subreddit`) as a Reddit-post-shaped digest.
pub fn render_reddit_post(clusters: &[Cluster], subreddit: &str) -> String {
    let mut md = String::new();

    let _ = write!(
        md,
        "I analyzed posts in r/{subreddit} from the past week to find repeated struggles. \
         Here are the top {} patterns I found.\n\n",
        clusters.len()
    );

    for (i, cluster) in clusters.iter().enumerate() {
        let _ = writeln!(md, "### {}. {}\n", i + 1, cluster.title);
        let _ = writeln!(md, "**The pattern:** {}\n", cluster.summary);

        if !cluster.quotes.is_empty() {
            md.push_str("**What people are saying:**\n");
            for quote in cluster.quotes.iter().take(3) {
                let _ = writeln!(md, "> \"{quote}\"\n");
            }
        }

        let _ = writeln!(md, "**Who this affects:** {}\n", cluster.target_audience);

        if !cluster.urls.is_empty() {
            let links: Vec<String> = cluster
                .urls
                .iter()
                .take(3)
                .enumerate()
                .map(|(j, url)| format!("[Thread {}]({url})", j + 1))
                .collect();
            let _ = writeln!(md, "**Sources:** {}\n", links.join(", "));
        }

        md.push_str("---\n\n");
    }

    md.push_str("---\n\n");
    md.push_str("I track these pain points weekly. ");
    md.push_str(
        "If you want the full list or alerts when people complain about specific topics, \
         comment **'alerts'** and I'll DM you the setup.\n\n",
    );
    md.push_str("*This is a curated digest, not promotion. Sources are linked above.*");

    md
}

/// Render `clusters` (for `subreddit`, week starting `week_start`) as a
/// fuller archive page, mirroring `_generate_archive_page`.
pub fn render_archive_page(clusters: &[Cluster], subreddit: &str, week_start: &str) -> String {
    let mut md = String::new();

    let _ = writeln!(md, "# Pain Clusters Archive: r/{subreddit}\n");
    let _ = writeln!(md, "**Week of:** {week_start}\n");
    md.push_str("---\n\n");

    for (i, cluster) in clusters.iter().enumerate() {
        let _ = writeln!(md, "## {}. {}\n", i + 1, cluster.title);
        let _ = writeln!(md, "**Summary:** {}\n", cluster.summary);
        let _ = writeln!(md, "**Target audience:** {}\n", cluster.target_audience);
        let _ = writeln!(md, "**Why it matters:** {}\n", cluster.why_it_matters);

        md.push_str("### Evidence\n\n");
        for quote in &cluster.quotes {
            let _ = writeln!(md, "> \"{quote}\"\n");
        }

        md.push_str("### Sources\n\n");
        for (j, url) in cluster.urls.iter().enumerate() {
            let _ = writeln!(md, "- [Thread {}]({url})", j + 1);
        }

        md.push_str("\n---\n\n");
    }

    md.push_str("## Methodology\n\n");
    md.push_str("This digest was generated by fetching public Reddit posts via RSS/JSON, ");
    md.push_str("filtering out self-promotion and celebration posts, using AI to extract pain ");
    md.push_str("signals and cluster them, and citing every source with a link.\n\n");
    md.push_str("No private data is scraped. No automated outreach is performed.");

    md
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cluster() -> Cluster {
        Cluster {
            id: "2026-07-20_checkout-a_3".into(),
            title: "Checkout abandonment".into(),
            summary: "Founders keep losing sales at checkout".into(),
            week_start: "2026-07-20".into(),
            target_audience: "indie SaaS founders".into(),
            why_it_matters: "recurring, monetizable pain".into(),
            signal_ids: vec![1, 2, 3],
            quotes: vec!["I lose 30% at checkout".into(), "nothing solves this".into(), "overflow".into(), "dropped".into()],
            urls: vec![
                "https://reddit.com/a".into(),
                "https://reddit.com/b".into(),
                "https://reddit.com/c".into(),
                "https://reddit.com/d".into(),
            ],
            created_at: "2026-07-27T00:00:00Z".into(),
        }
    }

    #[test]
    fn reddit_post_caps_quotes_and_sources_at_three() {
        let md = render_reddit_post(&[sample_cluster()], "SaaS");
        assert_eq!(md.matches('>').count(), 3);
        assert_eq!(md.matches("Thread").count(), 3);
    }

    #[test]
    fn reddit_post_mentions_pattern_count() {
        let md = render_reddit_post(&[sample_cluster()], "SaaS");
        assert!(md.contains("top 1 patterns"));
    }

    #[test]
    fn reddit_post_has_soft_cta_not_pushy() {
        let md = render_reddit_post(&[sample_cluster()], "SaaS");
        assert!(md.contains("comment **'alerts'**"));
        assert!(md.contains("not promotion"));
    }

    #[test]
    fn archive_page_includes_all_quotes_and_sources() {
        let md = render_archive_page(&[sample_cluster()], "SaaS", "2026-07-20");
        assert_eq!(md.matches('>').count(), 4);
        assert_eq!(md.matches("Thread").count(), 4);
    }

    #[test]
    fn empty_clusters_still_renders_header_and_cta() {
        let md = render_reddit_post(&[], "SaaS");
        assert!(md.contains("top 0 patterns"));
        assert!(md.contains("comment **'alerts'**"));
    }
}
