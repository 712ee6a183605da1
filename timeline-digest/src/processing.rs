use crate::policy::{HeuristicSpamPolicy, KeywordAdPolicy, WeightedEngagementPolicy};
use crate::traits::{AdPolicy, EngagementScorePolicy, SpamPolicy};
use crate::types::{Post, ProcessedPost};
use std::fmt;
use tracing::debug;

/// Why the filter dropped a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    Language,
    Spam,
    Ad,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RejectReason::Language => "language",
            RejectReason::Spam => "spam",
            RejectReason::Ad => "ad",
        };
        f.write_str(name)
    }
}

/// Result of one filter pass: survivors in input order, plus the rejects with
/// their tags already applied.
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub accepted: Vec<ProcessedPost>,
    pub rejected: Vec<(ProcessedPost, RejectReason)>,
}

impl FilterOutcome {
    pub fn rejected_count(&self, reason: RejectReason) -> usize {
        self.rejected.iter().filter(|(_, r)| *r == reason).count()
    }
}

/// Language allow-list, then spam, then ads. Order-preserving.
pub struct FilterStage {
    spam_policy: Box<dyn SpamPolicy>,
    ad_policy: Box<dyn AdPolicy>,
    allowed_languages: Vec<String>,
}

impl FilterStage {
    pub fn new(
        spam_policy: Box<dyn SpamPolicy>,
        ad_policy: Box<dyn AdPolicy>,
        allowed_languages: Vec<String>,
    ) -> Self {
        let allowed_languages = allowed_languages
            .into_iter()
            .map(|lang| lang.trim().to_lowercase())
            .filter(|lang| !lang.is_empty())
            .collect();
        Self {
            spam_policy,
            ad_policy,
            allowed_languages,
        }
    }

    /// Reference heuristics with the given allow-list.
    pub fn with_defaults(allowed_languages: Vec<String>) -> Self {
        Self::new(
            Box::new(HeuristicSpamPolicy::default()),
            Box::new(KeywordAdPolicy::default()),
            allowed_languages,
        )
    }

    pub fn allowed_languages(&self) -> &[String] {
        &self.allowed_languages
    }

    pub fn filter(&self, posts: Vec<ProcessedPost>) -> Vec<ProcessedPost> {
        self.partition(posts).accepted
    }

    pub fn partition(&self, posts: Vec<ProcessedPost>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();

        for mut item in posts {
            if !self.accepts_language(&item.post) {
                debug!("Rejected {} (language {:?})", item.id(), item.post.language);
                outcome.rejected.push((item, RejectReason::Language));
            } else if self.spam_policy.is_spam(&item.post) {
                item.analysis.mark_spam();
                debug!("Rejected {} as spam", item.id());
                outcome.rejected.push((item, RejectReason::Spam));
            } else if self.ad_policy.is_ad(&item.post) {
                item.analysis.mark_ad();
                debug!("Rejected {} as ad", item.id());
                outcome.rejected.push((item, RejectReason::Ad));
            } else {
                outcome.accepted.push(item);
            }
        }

        outcome
    }

    // Unknown language is never penalised.
    fn accepts_language(&self, post: &Post) -> bool {
        if self.allowed_languages.is_empty() {
            return true;
        }
        match post.language_tag() {
            Some(lang) => self.allowed_languages.contains(&lang),
            None => true,
        }
    }
}

/// Orders posts by score and keeps the top N.
pub struct RankingStage {
    score_policy: Box<dyn EngagementScorePolicy>,
    top_n: usize,
}

impl RankingStage {
    pub fn new(score_policy: Box<dyn EngagementScorePolicy>, top_n: usize) -> Self {
        Self { score_policy, top_n }
    }

    pub fn with_defaults(top_n: usize) -> Self {
        Self::new(Box::new(WeightedEngagementPolicy::default()), top_n)
    }

    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Top posts using the configured N.
    pub fn rank(&self, posts: Vec<ProcessedPost>) -> Vec<ProcessedPost> {
        self.select_top(posts, self.top_n)
    }

    pub fn select_top(&self, posts: Vec<ProcessedPost>, n: usize) -> Vec<ProcessedPost> {
        top_by_score(posts, n, |item| self.score_policy.score(&item.post))
    }
}

/// Sorts descending by `score` and truncates to `n`. The sort is stable, so
/// equal scores keep their input order. NaN scores sink to the bottom.
pub fn top_by_score<F>(posts: Vec<ProcessedPost>, n: usize, score: F) -> Vec<ProcessedPost>
where
    F: Fn(&ProcessedPost) -> f64,
{
    let mut scored: Vec<(f64, ProcessedPost)> = posts
        .into_iter()
        .map(|item| {
            let s = score(&item);
            (if s.is_nan() { f64::NEG_INFINITY } else { s }, item)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(n);
    scored.into_iter().map(|(_, item)| item).collect()
}
