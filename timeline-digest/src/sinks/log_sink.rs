use crate::render::DigestRenderer;
use crate::types::{DigestBatch, DigestSink};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Renders the digest and writes it to the log.
#[derive(Debug, Clone, Default)]
pub struct LogDigestSink {
    renderer: DigestRenderer,
}

impl LogDigestSink {
    pub fn new() -> Self {
        Self {
            renderer: DigestRenderer::new(),
        }
    }
}

#[async_trait]
impl DigestSink for LogDigestSink {
    fn sink_name(&self) -> String {
        "log".to_string()
    }

    async fn deliver(&self, batch: DigestBatch) -> anyhow::Result<()> {
        let message = self.renderer.render(&batch, Utc::now());
        info!("\n{}", message);
        Ok(())
    }
}
