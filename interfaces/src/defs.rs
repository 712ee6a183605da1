use std::hash::{Hash, Hasher};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One post on the timeline. Content is fixed once fetched; analysis lives in
/// [`PostAnalysis`] and travels next to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl Post {
    pub fn new(
        id: impl Into<String>,
        author: impl Into<String>,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            text: text.into(),
            created_at,
            like_count: 0,
            retweet_count: 0,
            reply_count: 0,
            url: String::new(),
            language: None,
        }
    }

    pub fn with_engagement(mut self, likes: u64, retweets: u64, replies: u64) -> Self {
        self.like_count = likes;
        self.retweet_count = retweets;
        self.reply_count = replies;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Weighted interaction count. Derived on demand, never stored.
    pub fn engagement_score(&self) -> f64 {
        0.5 * self.like_count as f64
            + 1.2 * self.retweet_count as f64
            + 1.5 * self.reply_count as f64
    }

    /// Raw interaction total (likes + retweets + replies).
    pub fn total_interactions(&self) -> u64 {
        self.like_count
            .saturating_add(self.retweet_count)
            .saturating_add(self.reply_count)
    }

    /// Language tag normalised to lowercase, `None` when unknown or blank.
    pub fn language_tag(&self) -> Option<String> {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .map(str::to_lowercase)
    }
}

// Identity is the id alone: an edited post is still the same post.
impl PartialEq for Post {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Post {}

impl Hash for Post {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Ordering used for checkpoints: plain lexicographic comparison of ids.
pub fn is_newer_than(id: &str, last_seen_id: &str) -> bool {
    id > last_seen_id
}

/// Analysis tags attached to a post while it moves through one run.
///
/// `is_spam` and `is_ad` can only go from false to true. `summary` is set at
/// most once; later writes are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAnalysis {
    is_ad: bool,
    is_spam: bool,
    summary: Option<String>,
}

impl PostAnalysis {
    pub fn is_ad(&self) -> bool {
        self.is_ad
    }

    pub fn is_spam(&self) -> bool {
        self.is_spam
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn mark_ad(&mut self) {
        self.is_ad = true;
    }

    pub fn mark_spam(&mut self) {
        self.is_spam = true;
    }

    /// Returns false when a summary was already present.
    pub fn set_summary(&mut self, summary: String) -> bool {
        if self.summary.is_some() {
            return false;
        }
        self.summary = Some(summary);
        true
    }
}

/// A post paired with its analysis tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPost {
    pub post: Post,
    pub analysis: PostAnalysis,
}

impl ProcessedPost {
    pub fn new(post: Post) -> Self {
        Self {
            post,
            analysis: PostAnalysis::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.post.id
    }

    pub fn engagement_score(&self) -> f64 {
        self.post.engagement_score()
    }

    pub fn summary(&self) -> Option<&str> {
        self.analysis.summary()
    }
}

impl From<Post> for ProcessedPost {
    fn from(post: Post) -> Self {
        Self::new(post)
    }
}

/// Named group of posts. Clusters handed to the core are never empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCluster {
    pub name: String,
    pub posts: Vec<ProcessedPost>,
}

impl TopicCluster {
    pub fn new(name: impl Into<String>, posts: Vec<ProcessedPost>) -> Self {
        Self {
            name: name.into(),
            posts,
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Time range a digest is labelled with. `start <= end` always holds,
/// including for deserialized windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct DigestWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct WindowBounds {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<WindowBounds> for DigestWindow {
    type Error = String;

    fn try_from(bounds: WindowBounds) -> std::result::Result<Self, Self::Error> {
        DigestWindow::new(bounds.start, bounds.end).ok_or_else(|| {
            format!("window start {} is after end {}", bounds.start, bounds.end)
        })
    }
}

impl DigestWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// `[end - span, end]`; a negative span collapses to an empty window.
    pub fn trailing(end: DateTime<Utc>, span: TimeDelta) -> Self {
        let span = span.max(TimeDelta::zero());
        let start = end.checked_sub_signed(span).unwrap_or(end);
        Self { start, end }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Final output of one pipeline run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DigestBatch {
    window: DigestWindow,
    top3: Vec<ProcessedPost>,
    clusters: Vec<TopicCluster>,
    all_posts: Vec<ProcessedPost>,
    overview: String,
}

impl DigestBatch {
    pub fn new(
        window: DigestWindow,
        top3: Vec<ProcessedPost>,
        clusters: Vec<TopicCluster>,
        all_posts: Vec<ProcessedPost>,
        overview: String,
    ) -> Self {
        Self {
            window,
            top3,
            clusters,
            all_posts,
            overview,
        }
    }

    pub fn window(&self) -> DigestWindow {
        self.window
    }

    pub fn top3(&self) -> &[ProcessedPost] {
        &self.top3
    }

    pub fn clusters(&self) -> &[TopicCluster] {
        &self.clusters
    }

    pub fn all_posts(&self) -> &[ProcessedPost] {
        &self.all_posts
    }

    pub fn overview(&self) -> &str {
        &self.overview
    }
}

/// Where raw posts come from.
///
/// Implementations must not fail for ordinary unavailability: they log and
/// return an empty list instead.
#[async_trait]
pub trait SourceFeed: Send + Sync {
    fn feed_name(&self) -> String;

    /// Posts strictly newer than `last_seen_id`, or the current visible window
    /// when there is no checkpoint yet.
    async fn fetch_latest(&self, last_seen_id: Option<&str>) -> Vec<Post>;
}

/// Persistence for the last-seen post id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, id: &str) -> Result<()>;
}

/// Summaries, topic clustering and batch overviews.
///
/// Every method degrades to the deterministic baseline in [`crate::baseline`]
/// rather than surfacing an error.
#[async_trait]
pub trait Summarizer: Send + Sync {
    fn summarizer_name(&self) -> String;

    async fn summarize_post(&self, post: &Post) -> String;

    /// Clusters must be non-empty and only contain posts from `posts`.
    async fn cluster(&self, posts: &[ProcessedPost]) -> Vec<TopicCluster>;

    async fn summarize_batch(&self, clusters: &[TopicCluster], top3: &[ProcessedPost]) -> String;
}

/// Final destination of a digest.
#[async_trait]
pub trait DigestSink: Send + Sync {
    fn sink_name(&self) -> String;

    async fn deliver(&self, batch: DigestBatch) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + minutes * 60, 0).unwrap()
    }

    #[test]
    fn engagement_score_uses_weighted_sum() {
        let post = Post::new("1", "a", "text", at(0)).with_engagement(10, 2, 1);
        assert!((post.engagement_score() - 8.9).abs() < 1e-9);
        assert_eq!(post.total_interactions(), 13);
    }

    #[test]
    fn posts_are_equal_by_id_only() {
        let a = Post::new("42", "alice", "first draft", at(0));
        let b = Post::new("42", "alice", "edited text", at(5)).with_engagement(3, 0, 0);
        let c = Post::new("43", "alice", "first draft", at(0));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn language_tag_is_lowercased_and_blank_is_unknown() {
        let post = Post::new("1", "a", "t", at(0)).with_language("EN");
        assert_eq!(post.language_tag().as_deref(), Some("en"));
        let blank = Post::new("2", "a", "t", at(0)).with_language("  ");
        assert_eq!(blank.language_tag(), None);
    }

    #[test]
    fn analysis_tags_are_write_once() {
        let mut analysis = PostAnalysis::default();
        analysis.mark_spam();
        analysis.mark_spam();
        assert!(analysis.is_spam());
        assert!(!analysis.is_ad());

        assert!(analysis.set_summary("first".to_string()));
        assert!(!analysis.set_summary("second".to_string()));
        assert_eq!(analysis.summary(), Some("first"));
    }

    #[test]
    fn trailing_window_spans_backwards_from_end() {
        let window = DigestWindow::trailing(at(60), TimeDelta::minutes(30));
        assert_eq!(window.start(), at(30));
        assert_eq!(window.end(), at(60));

        let collapsed = DigestWindow::trailing(at(60), TimeDelta::minutes(-5));
        assert_eq!(collapsed.start(), collapsed.end());
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        assert!(DigestWindow::new(at(10), at(0)).is_none());
        assert!(DigestWindow::new(at(0), at(0)).is_some());
    }

    #[test]
    fn inverted_bounds_do_not_make_a_window() {
        let inverted = WindowBounds {
            start: at(10),
            end: at(0),
        };
        assert!(DigestWindow::try_from(inverted).is_err());

        let ordered = WindowBounds {
            start: at(0),
            end: at(10),
        };
        let window = DigestWindow::try_from(ordered).unwrap();
        assert_eq!(window.start(), at(0));
        assert_eq!(window.end(), at(10));
    }

    #[test]
    fn checkpoint_ordering_is_lexicographic() {
        assert!(is_newer_than("105", "100"));
        assert!(!is_newer_than("100", "100"));
        assert!(!is_newer_than("099", "100"));
    }
}
