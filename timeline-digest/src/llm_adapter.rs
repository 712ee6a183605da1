use crate::config::LlmConfig;
use crate::types::{DigestError, Post, ProcessedPost, Result, Summarizer, TopicCluster};
use crate::utils::http::retry_backoff;
use crate::utils::text::truncate_chars;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use interfaces::BaselineSummarizer;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SUMMARY_MAX_TOKENS: u32 = 100;
const CLUSTER_MAX_TOKENS: u32 = 800;
const OVERVIEW_MAX_TOKENS: u32 = 300;

/// Summarizer backed by an OpenAI-compatible `/chat/completions` endpoint.
///
/// Every call degrades to [`BaselineSummarizer`] when the API key is missing
/// or the remote call fails, so the port never surfaces an error.
pub struct ChatLlmSummarizer {
    client: Client,
    config: LlmConfig,
    fallback: BaselineSummarizer,
}

impl ChatLlmSummarizer {
    pub fn new(mut config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        config.base_url = config.base_url.trim_end_matches('/').to_string();
        if !config.is_configured() {
            warn!("LLM API key not configured, every call will use the baseline fallback");
        }

        Ok(Self {
            client,
            config,
            fallback: BaselineSummarizer::default(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// One prompt, one answer. Retries transport failures and non-2xx replies.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let mut backoff = retry_backoff(Duration::from_millis(500));
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.complete_once(prompt, max_tokens).await {
                Ok(answer) => return Ok(answer),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "LLM call attempt {} failed, retrying in {:?}",
                                attempt + 1,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    }
                    break;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| DigestError::General("LLM call made no attempts".to_string())))
    }

    async fn complete_once(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.trim())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(DigestError::General(format!(
                "LLM endpoint returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| DigestError::General("LLM response had no choices".to_string()))
    }
}

#[async_trait]
impl Summarizer for ChatLlmSummarizer {
    fn summarizer_name(&self) -> String {
        format!("chat-llm ({})", self.config.model)
    }

    async fn summarize_post(&self, post: &Post) -> String {
        if !self.config.is_configured() {
            return self.fallback.summarize_post(post).await;
        }

        let prompt = format!(
            "Summarize the core point of this post in one sentence of at most 60 characters. \
             Output only the sentence, with no prefix.\n\n{}",
            post.text
        );

        match self.complete(&prompt, SUMMARY_MAX_TOKENS).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => {
                warn!("Empty summary for post {}, using fallback", post.id);
                self.fallback.summarize_post(post).await
            }
            Err(e) => {
                error!("Failed to summarize post {}: {}", post.id, e);
                self.fallback.summarize_post(post).await
            }
        }
    }

    async fn cluster(&self, posts: &[ProcessedPost]) -> Vec<TopicCluster> {
        if posts.is_empty() {
            return Vec::new();
        }
        if !self.config.is_configured() {
            return self.fallback.cluster(posts).await;
        }

        let listing: String = posts
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}\n\n", i, item.post.text))
            .collect();
        let prompt = format!(
            "Group the following {} posts by topic.\n\
             1. Name each topic with an emoji and a short label, e.g. \"🤖 AI Tools\".\n\
             2. Reply with a JSON array: [{{\"topic\": \"name\", \"indices\": [post numbers]}}]\n\
             3. Each post belongs to exactly one topic.\n\
             4. Output the JSON only, without markdown fences.\n\n\
             Posts:\n{}",
            posts.len(),
            listing
        );

        match self.complete(&prompt, CLUSTER_MAX_TOKENS).await {
            Ok(answer) => match parse_cluster_response(&answer, posts) {
                Some(clusters) => {
                    info!("LLM grouped {} posts into {} topics", posts.len(), clusters.len());
                    clusters
                }
                None => {
                    warn!("Unusable clustering output from LLM, using keyword clustering");
                    debug!("Raw clustering output: {}", answer);
                    self.fallback.cluster(posts).await
                }
            },
            Err(e) => {
                error!("Failed to cluster posts: {}", e);
                self.fallback.cluster(posts).await
            }
        }
    }

    async fn summarize_batch(&self, clusters: &[TopicCluster], top3: &[ProcessedPost]) -> String {
        if !self.config.is_configured() {
            return self.fallback.summarize_batch(clusters, top3).await;
        }

        let topics: String = clusters
            .iter()
            .map(|c| format!("- {} ({} posts)\n", c.name, c.len()))
            .collect();
        let highlights: String = top3
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "{}. {}: {}\n",
                    i + 1,
                    item.post.author,
                    truncate_chars(&item.post.text, 100)
                )
            })
            .collect();
        let prompt = format!(
            "Based on the topic distribution and top posts below, write a professional \
             trend insight of 100-150 words.\n\n\
             Topics:\n{}\n\
             Top posts:\n{}\n\
             Point out the main trends, add a useful observation, keep it readable and \
             output the text only, without a title.",
            topics, highlights
        );

        match self.complete(&prompt, OVERVIEW_MAX_TOKENS).await {
            Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
            Ok(_) => self.fallback.summarize_batch(clusters, top3).await,
            Err(e) => {
                error!("Failed to generate overview: {}", e);
                self.fallback.summarize_batch(clusters, top3).await
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    indices: Vec<i64>,
}

/// Removes a surrounding markdown code fence, with or without a `json` tag.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Maps `[{"topic": .., "indices": [..]}]` onto the given posts.
///
/// Out-of-range indices are skipped, a post is kept only in the first cluster
/// that names it, and clusters left empty are dropped. Returns `None` when the
/// text is not valid JSON or nothing usable remains.
pub fn parse_cluster_response(raw: &str, posts: &[ProcessedPost]) -> Option<Vec<TopicCluster>> {
    let entries: Vec<ClusterEntry> = match serde_json::from_str(strip_code_fences(raw)) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Clustering output is not valid JSON: {}", e);
            return None;
        }
    };

    let mut assigned = HashSet::new();
    let clusters: Vec<TopicCluster> = entries
        .into_iter()
        .filter_map(|entry| {
            let members: Vec<ProcessedPost> = entry
                .indices
                .into_iter()
                .filter_map(|idx| usize::try_from(idx).ok())
                .filter(|idx| *idx < posts.len() && assigned.insert(*idx))
                .map(|idx| posts[idx].clone())
                .collect();

            if members.is_empty() {
                return None;
            }
            let name = match entry.topic.trim() {
                "" => "🎯 Other Updates".to_string(),
                topic => topic.to_string(),
            };
            Some(TopicCluster::new(name, members))
        })
        .collect();

    if clusters.is_empty() {
        None
    } else {
        Some(clusters)
    }
}
