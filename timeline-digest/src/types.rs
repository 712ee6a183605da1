// Core entities and ports come from the interfaces crate
pub use interfaces::defs::{
    CheckpointStore, DigestBatch, DigestSink, DigestWindow, Post, PostAnalysis, ProcessedPost,
    SourceFeed, Summarizer, TopicCluster,
};

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(String),

    #[error("Delivery to {sink} failed: {reason}")]
    Delivery { sink: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Port(#[from] anyhow::Error),

    #[error("General error: {0}")]
    General(String),
}

impl From<figment::Error> for DigestError {
    fn from(err: figment::Error) -> Self {
        DigestError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
