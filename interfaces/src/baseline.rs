use async_trait::async_trait;

use crate::defs::Post;
use crate::defs::ProcessedPost;
use crate::defs::Summarizer;
use crate::defs::TopicCluster;

pub const ELLIPSIS: &str = "...";

/// Combined interactions across the top posts above which the overview calls
/// out strong engagement.
pub const HIGH_ENGAGEMENT_THRESHOLD: u64 = 5_000;

/// A topic label and the keywords that route a post into it.
#[derive(Clone, Debug)]
pub struct KeywordBucket {
    pub topic: String,
    pub keywords: Vec<String>,
}

impl KeywordBucket {
    pub fn new(topic: &str, keywords: &[&str]) -> Self {
        Self {
            topic: topic.to_owned(),
            keywords: keywords.iter().map(|keyword| keyword.to_lowercase()).collect(),
        }
    }

    fn matches(&self, lowercase_text: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| contains_keyword(lowercase_text, keyword))
    }
}

/// Knobs for the deterministic fallback used whenever a real summarizer is
/// missing or misbehaves.
#[derive(Clone, Debug)]
pub struct FallbackOptions {
    /// Texts of at most this many characters are used as their own summary.
    pub verbatim_max_chars: usize,
    /// Longer texts are cut to this many characters unless a sentence ends first.
    pub summary_max_chars: usize,
    pub sentence_terminators: Vec<char>,
    /// Checked in order; the first bucket with a matching keyword wins.
    pub buckets: Vec<KeywordBucket>,
    pub catch_all_topic: String,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            verbatim_max_chars: 100,
            summary_max_chars: 80,
            sentence_terminators: vec!['。'],
            buckets: vec![
                KeywordBucket::new(
                    "🤖 AI & Tools",
                    &["ai", "llm", "gpt", "gemini", "claude", "prompt", "模型", "提示词"],
                ),
                KeywordBucket::new(
                    "💼 Startups & Growth",
                    &[
                        "startup", "business", "growth", "founder", "创业", "增长", "粉丝",
                        "用户",
                    ],
                ),
            ],
            catch_all_topic: "🎯 Other Updates".to_owned(),
        }
    }
}

/// One-line summary of a post body.
pub fn summarize_text(text: &str, options: &FallbackOptions) -> String {
    if text.chars().count() <= options.verbatim_max_chars {
        return text.to_owned();
    }

    let sentence_end = text
        .chars()
        .position(|c| options.sentence_terminators.contains(&c));
    if let Some(index) = sentence_end {
        if index > 0 && index < options.summary_max_chars {
            return take_chars(text, index + 1).to_owned();
        }
    }

    format!("{}{}", take_chars(text, options.summary_max_chars), ELLIPSIS)
}

/// Keyword-bucket clustering. Empty buckets are never emitted, so an empty
/// input yields no clusters.
pub fn cluster_by_keywords(
    posts: &[ProcessedPost],
    options: &FallbackOptions,
) -> Vec<TopicCluster> {
    let mut buckets: Vec<Vec<ProcessedPost>> = vec![Vec::new(); options.buckets.len()];
    let mut other = Vec::new();

    for post in posts {
        let lowercase_text = post.post.text.to_lowercase();
        match options
            .buckets
            .iter()
            .position(|bucket| bucket.matches(&lowercase_text))
        {
            Some(index) => buckets[index].push(post.clone()),
            None => other.push(post.clone()),
        }
    }

    let mut clusters: Vec<TopicCluster> = options
        .buckets
        .iter()
        .zip(buckets)
        .filter(|(_, members)| !members.is_empty())
        .map(|(bucket, members)| TopicCluster::new(bucket.topic.clone(), members))
        .collect();
    if !other.is_empty() {
        clusters.push(TopicCluster::new(options.catch_all_topic.clone(), other));
    }
    clusters
}

/// Single templated sentence naming the leading topic.
pub fn overview(clusters: &[TopicCluster], top3: &[ProcessedPost]) -> String {
    let Some(lead) = clusters.first() else {
        return "No clear trend in this window; posts are scattered across topics.".to_owned();
    };

    let total: u64 = top3.iter().map(|post| post.post.total_interactions()).sum();
    let engagement = if total > HIGH_ENGAGEMENT_THRESHOLD {
        ", with strong overall engagement"
    } else {
        ""
    };

    format!(
        "Posts in this window center on \"{}\" and related topics{}.",
        strip_symbols(&lead.name),
        engagement
    )
}

/// Drops emoji and other pictographs from a topic label.
pub fn strip_symbols(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || c.is_ascii_punctuation())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn take_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

// ASCII keywords must match whole words ("ai" is not in "said"); anything
// else, such as CJK terms, matches as a plain substring.
fn contains_keyword(lowercase_text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if !keyword.is_ascii() {
        return lowercase_text.contains(keyword);
    }

    lowercase_text.match_indices(keyword).any(|(start, _)| {
        let before = lowercase_text[..start].chars().next_back();
        let after = lowercase_text[start + keyword.len()..].chars().next();
        let is_word = |c: char| c.is_ascii_alphanumeric();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Summarizer that only ever uses the local fallback.
#[derive(Clone, Debug, Default)]
pub struct BaselineSummarizer {
    options: FallbackOptions,
}

impl BaselineSummarizer {
    pub fn new(options: FallbackOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FallbackOptions {
        &self.options
    }
}

#[async_trait]
impl Summarizer for BaselineSummarizer {
    fn summarizer_name(&self) -> String {
        "baseline".to_owned()
    }

    async fn summarize_post(&self, post: &Post) -> String {
        summarize_text(&post.text, &self.options)
    }

    async fn cluster(&self, posts: &[ProcessedPost]) -> Vec<TopicCluster> {
        cluster_by_keywords(posts, &self.options)
    }

    async fn summarize_batch(&self, clusters: &[TopicCluster], top3: &[ProcessedPost]) -> String {
        overview(clusters, top3)
    }
}
