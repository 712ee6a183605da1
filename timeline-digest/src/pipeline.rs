use crate::digest::DigestAssembler;
use crate::fetcher::FetchStage;
use crate::processing::{FilterStage, RankingStage, RejectReason};
use crate::types::{
    CheckpointStore, DigestError, DigestSink, DigestWindow, ProcessedPost, Result, SourceFeed,
    Summarizer,
};
use chrono::{DateTime, TimeDelta, Utc};
use interfaces::{BaselineSummarizer, InMemoryCheckpointStore};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub const DEFAULT_WINDOW_MINUTES: i64 = 30;
pub const DEFAULT_TOP_N: usize = 25;
pub const DEFAULT_LANGUAGES: [&str; 2] = ["en", "zh"];

pub fn default_languages() -> Vec<String> {
    DEFAULT_LANGUAGES.iter().map(|lang| lang.to_string()).collect()
}

/// What one run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: Uuid,
    pub fetched: usize,
    pub rejected_language: usize,
    pub rejected_spam: usize,
    pub rejected_ad: usize,
    pub accepted: usize,
    pub ranked: usize,
    pub clusters: usize,
    pub delivered: bool,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            fetched: 0,
            rejected_language: 0,
            rejected_spam: 0,
            rejected_ad: 0,
            accepted: 0,
            ranked: 0,
            clusters: 0,
            delivered: false,
        }
    }
}

/// Fetch → filter → rank → assemble → deliver, strictly in sequence.
///
/// Runs must not overlap: the checkpoint store has no compare-and-swap, so
/// callers serialise invocations of [`DigestPipeline::run_once`].
pub struct DigestPipeline {
    fetch: FetchStage,
    filter: FilterStage,
    ranking: RankingStage,
    assembler: DigestAssembler,
    sink: Arc<dyn DigestSink>,
    window_span: TimeDelta,
}

impl DigestPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn window_span(&self) -> TimeDelta {
        self.window_span
    }

    /// Runs the pipeline once, labelling the digest with `[now - span, now]`.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("digest_run", run_id = %run_id);
        self.execute(run_id, now).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, now: DateTime<Utc>) -> Result<RunReport> {
        let mut report = RunReport::new(run_id);
        let window = DigestWindow::trailing(now, self.window_span);
        info!(
            "Starting digest run for window {} - {}",
            window.start(),
            window.end()
        );

        let raw = self.fetch.fetch_new().await?;
        report.fetched = raw.len();
        info!("Pulled {} raw posts from {}", raw.len(), self.fetch.feed_name());

        let outcome = self
            .filter
            .partition(raw.into_iter().map(ProcessedPost::new).collect());
        report.rejected_language = outcome.rejected_count(RejectReason::Language);
        report.rejected_spam = outcome.rejected_count(RejectReason::Spam);
        report.rejected_ad = outcome.rejected_count(RejectReason::Ad);
        report.accepted = outcome.accepted.len();
        info!(
            "{} posts left after filtering (language: {}, spam: {}, ad: {})",
            report.accepted, report.rejected_language, report.rejected_spam, report.rejected_ad
        );

        if outcome.accepted.is_empty() {
            info!("Nothing to digest in this run, skipping delivery");
            return Ok(report);
        }

        let ranked = self.ranking.rank(outcome.accepted);
        report.ranked = ranked.len();
        info!("Selected top {} posts for the digest", ranked.len());

        let batch = self.assembler.build(ranked, window).await;
        report.clusters = batch.clusters().len();

        let sink_name = self.sink.sink_name();
        self.sink
            .deliver(batch)
            .await
            .map_err(|e| DigestError::Delivery {
                sink: sink_name.clone(),
                reason: format!("{e:#}"),
            })?;
        report.delivered = true;

        info!("Digest delivered to {}", sink_name);
        Ok(report)
    }
}

/// Explicit wiring for a [`DigestPipeline`]. Feed and sink are required;
/// everything else falls back to the reference implementations.
pub struct PipelineBuilder {
    feed: Option<Arc<dyn SourceFeed>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    sink: Option<Arc<dyn DigestSink>>,
    filter: Option<FilterStage>,
    ranking: Option<RankingStage>,
    window_span: TimeDelta,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            feed: None,
            checkpoints: None,
            summarizer: None,
            sink: None,
            filter: None,
            ranking: None,
            window_span: TimeDelta::minutes(DEFAULT_WINDOW_MINUTES),
        }
    }

    pub fn feed(mut self, feed: Arc<dyn SourceFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn checkpoints(mut self, checkpoints: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DigestSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn filter_stage(mut self, filter: FilterStage) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn ranking_stage(mut self, ranking: RankingStage) -> Self {
        self.ranking = Some(ranking);
        self
    }

    pub fn window_span(mut self, span: TimeDelta) -> Self {
        self.window_span = span;
        self
    }

    pub fn build(self) -> Result<DigestPipeline> {
        let feed = self
            .feed
            .ok_or_else(|| DigestError::Config("pipeline needs a source feed".to_string()))?;
        let sink = self
            .sink
            .ok_or_else(|| DigestError::Config("pipeline needs a digest sink".to_string()))?;
        let checkpoints = self
            .checkpoints
            .unwrap_or_else(|| Arc::new(InMemoryCheckpointStore::new()));
        let summarizer = self
            .summarizer
            .unwrap_or_else(|| Arc::new(BaselineSummarizer::default()));
        let filter = self
            .filter
            .unwrap_or_else(|| FilterStage::with_defaults(default_languages()));
        let ranking = self
            .ranking
            .unwrap_or_else(|| RankingStage::with_defaults(DEFAULT_TOP_N));

        if ranking.top_n() == 0 {
            return Err(DigestError::Config("top_n must be at least 1".to_string()));
        }

        info!(
            "Built digest pipeline: feed={}, summarizer={}, sink={}, top_n={}",
            feed.feed_name(),
            summarizer.summarizer_name(),
            sink.sink_name(),
            ranking.top_n()
        );

        Ok(DigestPipeline {
            fetch: FetchStage::new(feed, checkpoints),
            filter,
            ranking,
            assembler: DigestAssembler::new(summarizer),
            sink,
            window_span: self.window_span,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
