use crate::config::{AppConfig, CheckpointKind, SinkKind, SourceKind};
use crate::llm_adapter::ChatLlmSummarizer;
use crate::pipeline::{DigestPipeline, PipelineBuilder};
use crate::processing::{FilterStage, RankingStage};
use crate::sinks::{LogDigestSink, WebhookDigestSink};
use crate::sources::{HttpTimelineFeed, SampleTimelineFeed};
use crate::types::{CheckpointStore, DigestError, DigestSink, Result, SourceFeed, Summarizer};
use chrono::{TimeDelta, Utc};
use interfaces::{BaselineSummarizer, InMemoryCheckpointStore, SqliteCheckpointStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Wires every adapter named in `config` into a ready pipeline.
pub async fn build_pipeline(config: &AppConfig) -> Result<DigestPipeline> {
    config.validate()?;

    let feed: Arc<dyn SourceFeed> = match config.source.kind {
        SourceKind::Sample => Arc::new(SampleTimelineFeed::new()),
        SourceKind::Http => Arc::new(HttpTimelineFeed::new(&config.source)?),
    };

    let checkpoints: Arc<dyn CheckpointStore> = match config.checkpoint.kind {
        CheckpointKind::Memory => Arc::new(InMemoryCheckpointStore::new()),
        CheckpointKind::Sqlite => Arc::new(
            SqliteCheckpointStore::connect(
                &config.checkpoint.database_url,
                config.checkpoint.key.clone(),
            )
            .await
            .map_err(|e| DigestError::Checkpoint(format!("{e:#}")))?,
        ),
    };

    let summarizer: Arc<dyn Summarizer> = if config.llm.is_configured() {
        Arc::new(ChatLlmSummarizer::new(config.llm.clone())?)
    } else {
        info!("No LLM API key configured, using the baseline summarizer");
        Arc::new(BaselineSummarizer::default())
    };

    let sink: Arc<dyn DigestSink> = match config.sink.kind {
        SinkKind::Log => Arc::new(LogDigestSink::new()),
        SinkKind::Webhook => Arc::new(WebhookDigestSink::new(&config.sink)?),
    };

    let window_span = TimeDelta::try_minutes(config.pipeline.window_minutes).ok_or_else(|| {
        DigestError::Config("pipeline.window_minutes is out of range".to_string())
    })?;

    PipelineBuilder::new()
        .feed(feed)
        .checkpoints(checkpoints)
        .summarizer(summarizer)
        .sink(sink)
        .filter_stage(FilterStage::with_defaults(config.pipeline.allowed_languages.clone()))
        .ranking_stage(RankingStage::with_defaults(config.pipeline.top_n))
        .window_span(window_span)
        .build()
}

/// Runs the pipeline on a fixed interval until `shutdown` resolves.
///
/// The first run starts immediately. Runs never overlap; a tick that comes due
/// while a run is in flight is delayed. A failed run is logged and the loop
/// keeps going. Returns the number of completed runs.
pub async fn run_schedule<F>(pipeline: &DigestPipeline, every: Duration, shutdown: F) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut completed = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, stopping scheduler after {} runs", completed);
                return completed;
            }
            _ = ticker.tick() => {
                match pipeline.run_once(Utc::now()).await {
                    Ok(report) => info!(
                        "Run {} finished: fetched {}, ranked {}, delivered {}",
                        report.run_id, report.fetched, report.ranked, report.delivered
                    ),
                    Err(e) => error!("Digest run failed: {}", e),
                }
                completed += 1;
            }
        }
    }
}
