use crate::types::{Post, SourceFeed};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct SamplePost {
    author: &'static str,
    text: &'static str,
    age_minutes: i64,
    likes: u64,
    retweets: u64,
    replies: u64,
    language: &'static str,
}

const SAMPLE_POSTS: [SamplePost; 4] = [
    SamplePost {
        author: "vitalik",
        text: "Some thoughts on rollup decentralization and L2 security",
        age_minutes: 5,
        likes: 1200,
        retweets: 300,
        replies: 210,
        language: "en",
    },
    SamplePost {
        author: "ai_researcher",
        text: "New paper: efficient long-context transformers with sparse routing. \
               LLM inference gets 3x cheaper.",
        age_minutes: 10,
        likes: 800,
        retweets: 150,
        replies: 90,
        language: "en",
    },
    SamplePost {
        author: "random_shiller",
        text: "BUY NOW!!! 1000x gem, limited offer, insane discount!!!",
        age_minutes: 1,
        likes: 2,
        retweets: 1,
        replies: 0,
        language: "en",
    },
    SamplePost {
        author: "growth_notes",
        text: "创业第一年最重要的是找到愿意付费的用户。\
               增长来自留存，而不是投放。",
        age_minutes: 20,
        likes: 430,
        retweets: 60,
        replies: 45,
        language: "zh",
    },
];

/// In-process feed producing a small, realistic timeline on every call.
///
/// Ids come from a monotonic, zero-padded sequence so lexicographic order
/// matches creation order and the checkpoint contract holds across runs.
pub struct SampleTimelineFeed {
    next_seq: Mutex<u64>,
}

impl SampleTimelineFeed {
    pub fn new() -> Self {
        Self {
            next_seq: Mutex::new(1),
        }
    }

    pub fn format_id(seq: u64) -> String {
        format!("{:020}", seq)
    }
}

impl Default for SampleTimelineFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceFeed for SampleTimelineFeed {
    fn feed_name(&self) -> String {
        "sample".to_string()
    }

    async fn fetch_latest(&self, last_seen_id: Option<&str>) -> Vec<Post> {
        let mut next_seq = self.next_seq.lock().await;

        // Resume numerically above a checkpoint written by an earlier process,
        // so every generated id is newer. A non-numeric id belongs to another
        // feed sharing the checkpoint key.
        if let Some(id) = last_seen_id {
            match id.parse::<u64>() {
                Ok(seen) => *next_seq = (*next_seq).max(seen.saturating_add(1)),
                Err(_) => warn!(
                    "Ignoring checkpoint {:?}: not a sample feed id, use a separate checkpoint.key",
                    id
                ),
            }
        }

        let now = Utc::now();
        let posts: Vec<Post> = SAMPLE_POSTS
            .iter()
            .map(|sample| {
                let id = Self::format_id(*next_seq);
                *next_seq = next_seq.saturating_add(1);
                Post::new(
                    id.clone(),
                    sample.author,
                    sample.text,
                    now - TimeDelta::minutes(sample.age_minutes),
                )
                .with_engagement(sample.likes, sample.retweets, sample.replies)
                .with_language(sample.language)
                .with_url(format!("https://x.com/{}/status/{}", sample.author, id))
            })
            .collect();

        debug!("Sample feed sequence now at {}", *next_seq);
        info!("Sample feed produced {} posts", posts.len());
        posts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_increase_across_calls() {
        let feed = SampleTimelineFeed::new();
        let first = feed.fetch_latest(None).await;
        assert_eq!(first.len(), SAMPLE_POSTS.len());

        let checkpoint = first.iter().map(|p| p.id.clone()).max().unwrap();
        let second = feed.fetch_latest(Some(&checkpoint)).await;
        assert_eq!(second.len(), SAMPLE_POSTS.len());
        assert!(second.iter().all(|p| p.id > checkpoint));
    }

    #[tokio::test]
    async fn resumes_above_foreign_checkpoint() {
        let feed = SampleTimelineFeed::new();
        let checkpoint = SampleTimelineFeed::format_id(500);
        let posts = feed.fetch_latest(Some(&checkpoint)).await;
        assert_eq!(posts[0].id, SampleTimelineFeed::format_id(501));
    }

    #[tokio::test]
    async fn ignores_checkpoint_from_another_feed() {
        let feed = SampleTimelineFeed::new();
        let posts = feed.fetch_latest(Some("1802")).await;
        assert_eq!(posts.len(), SAMPLE_POSTS.len());
        assert_eq!(posts[0].id, SampleTimelineFeed::format_id(1803));

        let feed = SampleTimelineFeed::new();
        let posts = feed.fetch_latest(Some("status-1802")).await;
        assert_eq!(posts.len(), SAMPLE_POSTS.len());
        assert_eq!(posts[0].id, SampleTimelineFeed::format_id(1));
    }

    #[tokio::test]
    async fn includes_an_advert() {
        let posts = SampleTimelineFeed::new().fetch_latest(None).await;
        assert!(posts.iter().any(|p| p.text.contains("BUY NOW")));
        assert!(posts.iter().any(|p| p.language.as_deref() == Some("zh")));
    }
}
