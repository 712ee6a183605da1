use crate::types::Post;

/// Ranking score for a post. Higher ranks first.
pub trait EngagementScorePolicy: Send + Sync {
    fn score(&self, post: &Post) -> f64;
}

/// Whether a post is meaningless noise (empty, only tags or mentions, bot-like).
pub trait SpamPolicy: Send + Sync {
    fn is_spam(&self, post: &Post) -> bool;
}

/// Whether a post is an advertisement.
pub trait AdPolicy: Send + Sync {
    fn is_ad(&self, post: &Post) -> bool;
}
