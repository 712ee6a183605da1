pub mod app;
pub mod config;
pub mod digest;
pub mod fetcher;
pub mod llm_adapter;
pub mod pipeline;
pub mod policy;
pub mod processing;
pub mod render;
pub mod sinks;
pub mod sources;
pub mod traits;
pub mod types;
pub mod utils;

pub use types::*;
pub use app::{build_pipeline, run_schedule};
pub use config::AppConfig;
pub use digest::DigestAssembler;
pub use fetcher::FetchStage;
pub use llm_adapter::ChatLlmSummarizer;
pub use pipeline::{DigestPipeline, PipelineBuilder, RunReport};
pub use processing::{FilterOutcome, FilterStage, RankingStage, RejectReason};
pub use render::DigestRenderer;
pub use sinks::{LogDigestSink, WebhookDigestSink};
pub use sources::{HttpTimelineFeed, SampleTimelineFeed};
