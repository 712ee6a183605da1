//! Domain contract for the timeline digest: entities, capability ports and
//! the deterministic fallback every adapter degrades to.

pub mod baseline;
pub mod defs;
pub mod state;

pub use baseline::{BaselineSummarizer, FallbackOptions, KeywordBucket};
pub use defs::{
    CheckpointStore, DigestBatch, DigestSink, DigestWindow, Post, PostAnalysis, ProcessedPost,
    SourceFeed, Summarizer, TopicCluster,
};
pub use state::{InMemoryCheckpointStore, SqliteCheckpointStore};
