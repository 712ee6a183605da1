use crate::config::SourceConfig;
use crate::types::{DigestError, Post, Result, SourceFeed};
use crate::utils::http::retry_backoff;
use crate::utils::text::{parse_count, status_id_from_url};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use chrono::{DateTime, Utc};
use interfaces::defs::is_newer_than;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Timeline served as JSON over HTTP.
///
/// `GET {endpoint}?since_id=<checkpoint>` must answer with either an array of
/// posts or `{"posts": [...]}`. Failures are logged and yield an empty list.
pub struct HttpTimelineFeed {
    client: Client,
    endpoint: Url,
    max_retries: u32,
}

impl HttpTimelineFeed {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| DigestError::Config("http source needs an endpoint".to_string()))?;
        let endpoint = Url::parse(endpoint)?;

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            max_retries: config.max_retries,
        })
    }

    pub fn request_url(&self, last_seen_id: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Some(id) = last_seen_id {
            url.query_pairs_mut().append_pair("since_id", id);
        }
        url
    }

    async fn fetch_body(&self, url: &Url) -> Result<String> {
        let mut backoff = retry_backoff(Duration::from_secs(1));
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let outcome = match self.client.get(url.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    response.text().await.map_err(DigestError::Http)
                }
                Ok(response) => Err(DigestError::General(format!(
                    "HTTP {}: {}",
                    response.status(),
                    response.status().canonical_reason().unwrap_or("Unknown")
                ))),
                Err(e) => Err(DigestError::Http(e)),
            };

            match outcome {
                Ok(body) => return Ok(body),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "Attempt {} failed for {}, retrying in {:?}",
                                attempt + 1,
                                url,
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

        Err(last_error.unwrap_or_else(|| DigestError::General("no fetch attempt made".to_string())))
    }
}

#[async_trait]
impl SourceFeed for HttpTimelineFeed {
    fn feed_name(&self) -> String {
        format!("http ({})", self.endpoint.host_str().unwrap_or("unknown host"))
    }

    async fn fetch_latest(&self, last_seen_id: Option<&str>) -> Vec<Post> {
        let url = self.request_url(last_seen_id);
        debug!("Fetching timeline from {}", url);

        let body = match self.fetch_body(&url).await {
            Ok(body) => body,
            Err(e) => {
                error!(
                    "Failed to fetch timeline from {} after {} attempts: {}",
                    url,
                    self.max_retries + 1,
                    e
                );
                return Vec::new();
            }
        };

        match parse_timeline(&body, last_seen_id, Utc::now()) {
            Ok(posts) => {
                info!("Fetched {} new posts from {}", posts.len(), self.endpoint);
                posts
            }
            Err(e) => {
                warn!("Timeline response from {} could not be parsed: {}", self.endpoint, e);
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePost {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default, alias = "username")]
    author: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default, alias = "permalink")]
    url: Option<String>,
    #[serde(default, alias = "likes")]
    like_count: Option<Value>,
    #[serde(default, alias = "retweets")]
    retweet_count: Option<Value>,
    #[serde(default, alias = "replies")]
    reply_count: Option<Value>,
    #[serde(default, alias = "lang")]
    language: Option<String>,
}

impl WirePost {
    fn resolve_id(&self) -> Option<String> {
        match &self.id {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => self.url.as_deref().and_then(status_id_from_url),
        }
    }

    fn into_post(self, fetched_at: DateTime<Utc>) -> Option<Post> {
        let id = self.resolve_id()?;
        let created_at = self
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or(fetched_at);

        let mut post = Post::new(
            id,
            self.author.unwrap_or_else(|| "unknown".to_string()),
            self.text,
            created_at,
        )
        .with_engagement(
            count_value(self.like_count.as_ref()),
            count_value(self.retweet_count.as_ref()),
            count_value(self.reply_count.as_ref()),
        );
        if let Some(url) = self.url {
            post = post.with_url(url);
        }
        if let Some(language) = self.language {
            post = post.with_language(language);
        }
        Some(post)
    }
}

fn count_value(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => parse_count(s).unwrap_or(0),
        _ => 0,
    }
}

/// Turns a timeline response into posts strictly newer than `last_seen_id`,
/// deduplicated by id and ordered newest first. Entries without a usable id
/// are skipped; a missing or malformed timestamp becomes `fetched_at`.
pub fn parse_timeline(
    body: &str,
    last_seen_id: Option<&str>,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<Post>> {
    let entries = match serde_json::from_str::<Value>(body)? {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("posts") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(DigestError::General(
                    "expected an array or an object with a \"posts\" array".to_string(),
                ))
            }
        },
        _ => {
            return Err(DigestError::General(
                "expected an array or an object with a \"posts\" array".to_string(),
            ))
        }
    };

    let mut seen = HashSet::new();
    let mut posts: Vec<Post> = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<WirePost>(entry) {
            Ok(wire) => wire.into_post(fetched_at),
            Err(e) => {
                debug!("Skipping malformed timeline entry: {}", e);
                None
            }
        })
        .filter(|post| last_seen_id.map_or(true, |seen_id| is_newer_than(&post.id, seen_id)))
        .filter(|post| seen.insert(post.id.clone()))
        .collect();

    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}
