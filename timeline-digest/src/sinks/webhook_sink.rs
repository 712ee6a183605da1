use crate::config::SinkConfig;
use crate::render::DigestRenderer;
use crate::types::{DigestBatch, DigestError, DigestSink, Result};
use crate::utils::text::chunk_by_lines;
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts the rendered digest to a Discord-style webhook, one request per chunk.
pub struct WebhookDigestSink {
    client: Client,
    webhook_url: Url,
    max_message_chars: usize,
    renderer: DigestRenderer,
}

impl WebhookDigestSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let webhook_url = config
            .webhook_url
            .as_deref()
            .ok_or_else(|| DigestError::Config("webhook sink needs a webhook_url".to_string()))?;

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            webhook_url: Url::parse(webhook_url)?,
            max_message_chars: config.max_message_chars.max(1),
            renderer: DigestRenderer::new(),
        })
    }

    pub fn chunks(&self, message: &str) -> Vec<String> {
        chunk_by_lines(message, self.max_message_chars)
    }
}

#[async_trait]
impl DigestSink for WebhookDigestSink {
    fn sink_name(&self) -> String {
        format!("webhook ({})", self.webhook_url.host_str().unwrap_or("unknown host"))
    }

    async fn deliver(&self, batch: DigestBatch) -> anyhow::Result<()> {
        let message = self.renderer.render(&batch, Utc::now());
        let chunks = self.chunks(&message);
        let total = chunks.len();

        for (idx, chunk) in chunks.iter().enumerate() {
            let response = self
                .client
                .post(self.webhook_url.clone())
                .json(&WebhookMessage { content: chunk })
                .send()
                .await
                .with_context(|| format!("failed to post chunk {}/{}", idx + 1, total))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<body unavailable>".to_string());
                bail!("webhook returned {} for chunk {}/{}: {}", status, idx + 1, total, body);
            }
            debug!("Delivered chunk {}/{} ({} chars)", idx + 1, total, chunk.chars().count());
        }

        info!("Posted digest to webhook in {} message(s)", total);
        Ok(())
    }
}
