use crate::types::DigestBatch;
use crate::utils::text::{extract_title, format_count, sample_keywords, wrap_sentences};
use crate::utils::time::{format_window_bound, relative_time};
use chrono::{DateTime, Utc};
use std::fmt::Write;

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const TITLE_MAX_CHARS: usize = 60;
const OVERVIEW_WIDTH: usize = 80;
const KEYWORD_SAMPLE_POSTS: usize = 3;

/// Chat-style plain text rendering of a digest.
#[derive(Debug, Clone, Default)]
pub struct DigestRenderer;

impl DigestRenderer {
    pub fn new() -> Self {
        Self
    }

    /// `now` anchors the relative ages shown next to each highlight.
    pub fn render(&self, batch: &DigestBatch, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_digest(&mut out, batch, now);
        out
    }

    fn write_digest(
        &self,
        out: &mut String,
        batch: &DigestBatch,
        now: DateTime<Utc>,
    ) -> std::fmt::Result {
        let window = batch.window();
        writeln!(out, "📊 **Timeline Digest**")?;
        writeln!(
            out,
            "⏰ Window: {} - {} UTC",
            format_window_bound(window.start()),
            format_window_bound(window.end())
        )?;

        write!(out, "📈 Processed: {} posts", batch.all_posts().len())?;
        let total: u64 = batch
            .all_posts()
            .iter()
            .map(|item| item.post.total_interactions())
            .sum();
        if total > 0 {
            write!(out, " | Total interactions: {}", format_count(total))?;
        }
        writeln!(out)?;
        writeln!(out)?;

        writeln!(out, "{}", SEPARATOR)?;
        writeln!(out, "🏆 **Top {}**", batch.top3().len())?;
        writeln!(out)?;
        for (idx, item) in batch.top3().iter().enumerate() {
            let post = &item.post;
            let title = extract_title(&post.text, TITLE_MAX_CHARS);
            writeln!(out, "{} **{}**", rank_marker(idx + 1), title)?;
            writeln!(out, "   👤 {} | {}", post.author, relative_time(post.created_at, now))?;
            if let Some(summary) = item.summary().filter(|s| *s != title && !s.is_empty()) {
                writeln!(out, "   💡 {}", summary)?;
            }
            writeln!(
                out,
                "   📊 {} ❤️ · {} 🔄 · {} 💬",
                format_count(post.like_count),
                format_count(post.retweet_count),
                format_count(post.reply_count)
            )?;
            if !post.url.is_empty() {
                writeln!(out, "   🔗 <{}>", post.url)?;
            }
            writeln!(out)?;
        }

        writeln!(out, "{}", SEPARATOR)?;
        writeln!(out, "📚 **Topics**")?;
        writeln!(out)?;
        for cluster in batch.clusters() {
            writeln!(out, "{} ({} posts)", cluster.name, cluster.len())?;
            let keywords = sample_keywords(
                cluster.posts.iter().map(|item| item.post.text.as_str()),
                KEYWORD_SAMPLE_POSTS,
            );
            writeln!(out, "   Trending: {}", keywords)?;
        }
        writeln!(out)?;

        writeln!(out, "{}", SEPARATOR)?;
        writeln!(out, "💭 **Overview**")?;
        writeln!(out)?;
        writeln!(out, "{}", wrap_sentences(batch.overview(), OVERVIEW_WIDTH))?;
        Ok(())
    }
}

fn rank_marker(rank: usize) -> String {
    match rank {
        1 => "1️⃣".to_string(),
        2 => "2️⃣".to_string(),
        3 => "3️⃣".to_string(),
        n => format!("{}.", n),
    }
}
