//! Reference policies. Stages only see the traits in [`crate::traits`], so
//! any of these can be replaced at wiring time.

use crate::traits::{AdPolicy, EngagementScorePolicy, SpamPolicy};
use crate::types::Post;

/// `likes * w_like + retweets * w_retweet + replies * w_reply`.
#[derive(Debug, Clone)]
pub struct WeightedEngagementPolicy {
    pub like_weight: f64,
    pub retweet_weight: f64,
    pub reply_weight: f64,
}

impl Default for WeightedEngagementPolicy {
    fn default() -> Self {
        Self {
            like_weight: 0.5,
            retweet_weight: 1.2,
            reply_weight: 1.5,
        }
    }
}

impl EngagementScorePolicy for WeightedEngagementPolicy {
    fn score(&self, post: &Post) -> f64 {
        self.like_weight * post.like_count as f64
            + self.retweet_weight * post.retweet_count as f64
            + self.reply_weight * post.reply_count as f64
    }
}

/// Flags blank posts and posts that are little more than hashtags or mentions.
#[derive(Debug, Clone)]
pub struct HeuristicSpamPolicy {
    /// Minimum characters left once `#`, `@` and whitespace are removed.
    pub min_content_chars: usize,
}

impl Default for HeuristicSpamPolicy {
    fn default() -> Self {
        Self { min_content_chars: 5 }
    }
}

impl SpamPolicy for HeuristicSpamPolicy {
    fn is_spam(&self, post: &Post) -> bool {
        let content_chars = post
            .text
            .chars()
            .filter(|c| *c != '#' && *c != '@' && !c.is_whitespace())
            .count();
        content_chars == 0 || content_chars < self.min_content_chars
    }
}

/// Case-insensitive substring match against promotional phrases.
#[derive(Debug, Clone)]
pub struct KeywordAdPolicy {
    keywords: Vec<String>,
}

impl KeywordAdPolicy {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.as_ref().to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

impl Default for KeywordAdPolicy {
    fn default() -> Self {
        Self::new([
            "buy now",
            "discount",
            "sale",
            "limited offer",
            "promo code",
            "sponsored",
        ])
    }
}

impl AdPolicy for KeywordAdPolicy {
    fn is_ad(&self, post: &Post) -> bool {
        let text = post.text.to_lowercase();
        self.keywords.iter().any(|keyword| text.contains(keyword.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(text: &str) -> Post {
        Post::new("1", "someone", text, Utc::now())
    }

    #[test]
    fn weighted_policy_matches_post_score_by_default() {
        let p = post("hello world").with_engagement(10, 2, 1);
        let score = WeightedEngagementPolicy::default().score(&p);
        assert!((score - 8.9).abs() < 1e-9);
        assert!((score - p.engagement_score()).abs() < 1e-9);
    }

    #[test]
    fn spam_policy_flags_blank_tag_only_and_tiny_posts() {
        let policy = HeuristicSpamPolicy::default();
        assert!(policy.is_spam(&post("")));
        assert!(policy.is_spam(&post("   \n\t")));
        assert!(policy.is_spam(&post("#@ # @@")));
        assert!(policy.is_spam(&post("lol")));
        assert!(policy.is_spam(&post("#a #b @c")));
        assert!(!policy.is_spam(&post("Shipping the new release today")));
    }

    #[test]
    fn ad_policy_matches_case_insensitively() {
        let policy = KeywordAdPolicy::default();
        assert!(policy.is_ad(&post("BUY NOW!!! insane gains")));
        assert!(policy.is_ad(&post("Use Promo Code TWEET10")));
        assert!(!policy.is_ad(&post("A thoughtful thread on compilers")));
    }

    #[test]
    fn ad_policy_ignores_blank_keywords() {
        let policy = KeywordAdPolicy::new(["", "giveaway"]);
        assert_eq!(policy.keywords(), &["giveaway".to_string()]);
        assert!(!policy.is_ad(&post("nothing to see")));
    }
}
