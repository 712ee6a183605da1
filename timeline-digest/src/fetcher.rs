use crate::types::{CheckpointStore, DigestError, Post, Result, SourceFeed};
use std::sync::Arc;
use tracing::{debug, info};

/// Pulls only-new posts from the feed and advances the checkpoint.
pub struct FetchStage {
    feed: Arc<dyn SourceFeed>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl FetchStage {
    pub fn new(feed: Arc<dyn SourceFeed>, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        Self { feed, checkpoints }
    }

    pub fn feed_name(&self) -> String {
        self.feed.feed_name()
    }

    /// Reads the checkpoint once, fetches, and writes the lexicographically
    /// largest returned id back. An empty fetch leaves the checkpoint alone.
    pub async fn fetch_new(&self) -> Result<Vec<Post>> {
        let last_seen = self
            .checkpoints
            .load()
            .await
            .map_err(|e| DigestError::Checkpoint(e.to_string()))?;

        debug!(
            "Fetching from {} since {}",
            self.feed.feed_name(),
            last_seen.as_deref().unwrap_or("<start>")
        );
        let posts = self.feed.fetch_latest(last_seen.as_deref()).await;

        match posts.iter().map(|post| post.id.as_str()).max() {
            Some(newest) => {
                self.checkpoints
                    .save(newest)
                    .await
                    .map_err(|e| DigestError::Checkpoint(e.to_string()))?;
                info!(
                    "Fetched {} posts from {}, checkpoint {} -> {}",
                    posts.len(),
                    self.feed.feed_name(),
                    last_seen.as_deref().unwrap_or("<none>"),
                    newest
                );
            }
            None => debug!("No new posts from {}, checkpoint unchanged", self.feed.feed_name()),
        }

        Ok(posts)
    }
}
