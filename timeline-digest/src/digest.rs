use crate::processing::top_by_score;
use crate::types::{DigestBatch, DigestWindow, ProcessedPost, Summarizer, TopicCluster};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Number of highlighted posts in every digest.
pub const TOP_HIGHLIGHTS: usize = 3;

/// Builds a [`DigestBatch`] from ranked posts by driving the summarizer.
pub struct DigestAssembler {
    summarizer: Arc<dyn Summarizer>,
}

impl DigestAssembler {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }

    pub fn summarizer_name(&self) -> String {
        self.summarizer.summarizer_name()
    }

    pub async fn build(&self, ranked: Vec<ProcessedPost>, window: DigestWindow) -> DigestBatch {
        info!(
            "Assembling digest for {} posts with {}",
            ranked.len(),
            self.summarizer.summarizer_name()
        );

        let summarized = self.attach_summaries(ranked).await;

        // Cluster output is trusted as-is; the port guarantees non-empty
        // clusters drawn from the input.
        let clusters: Vec<TopicCluster> = self.summarizer.cluster(&summarized).await;
        debug!("Summarizer produced {} clusters", clusters.len());

        let top3 = top_by_score(summarized.clone(), TOP_HIGHLIGHTS, |item| {
            item.engagement_score()
        });

        let overview = self.summarizer.summarize_batch(&clusters, &top3).await;

        DigestBatch::new(window, top3, clusters, summarized, overview)
    }

    async fn attach_summaries(&self, ranked: Vec<ProcessedPost>) -> Vec<ProcessedPost> {
        let summaries = join_all(
            ranked
                .iter()
                .map(|item| self.summarizer.summarize_post(&item.post)),
        )
        .await;

        ranked
            .into_iter()
            .zip(summaries)
            .map(|(mut item, summary)| {
                if !item.analysis.set_summary(summary) {
                    debug!("Post {} already had a summary, keeping it", item.id());
                }
                item
            })
            .collect()
    }
}
