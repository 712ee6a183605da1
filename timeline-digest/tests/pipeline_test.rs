use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use interfaces::{BaselineSummarizer, InMemoryCheckpointStore};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use timeline_digest::{
    CheckpointStore, DigestAssembler, DigestBatch, DigestError, DigestPipeline, DigestSink,
    DigestWindow, FilterStage, Post, ProcessedPost, RankingStage, SourceFeed, Summarizer,
    TopicCluster,
};
use tokio::sync::Mutex;
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init()
            .ok();
    });
}

fn now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_717_000_000, 0).unwrap()
}

/// Serves a fixed set of posts, honouring the checkpoint like a real feed.
struct FixedFeed {
    posts: Vec<Post>,
}

#[async_trait]
impl SourceFeed for FixedFeed {
    fn feed_name(&self) -> String {
        "fixed".to_string()
    }

    async fn fetch_latest(&self, last_seen_id: Option<&str>) -> Vec<Post> {
        self.posts
            .iter()
            .filter(|p| last_seen_id.map_or(true, |seen| p.id.as_str() > seen))
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<DigestBatch>>,
}

#[async_trait]
impl DigestSink for RecordingSink {
    fn sink_name(&self) -> String {
        "recording".to_string()
    }

    async fn deliver(&self, batch: DigestBatch) -> anyhow::Result<()> {
        self.batches.lock().await.push(batch);
        Ok(())
    }
}

struct RejectingSink;

#[async_trait]
impl DigestSink for RejectingSink {
    fn sink_name(&self) -> String {
        "rejecting".to_string()
    }

    async fn deliver(&self, _batch: DigestBatch) -> anyhow::Result<()> {
        anyhow::bail!("channel is read-only")
    }
}

struct BrokenStore;

#[async_trait]
impl CheckpointStore for BrokenStore {
    async fn load(&self) -> anyhow::Result<Option<String>> {
        anyhow::bail!("disk on fire")
    }

    async fn save(&self, _id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Baseline behaviour plus a call counter.
#[derive(Default)]
struct CountingSummarizer {
    inner: BaselineSummarizer,
    summaries: AtomicUsize,
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    fn summarizer_name(&self) -> String {
        "counting".to_string()
    }

    async fn summarize_post(&self, post: &Post) -> String {
        self.summaries.fetch_add(1, Ordering::SeqCst);
        self.inner.summarize_post(post).await
    }

    async fn cluster(&self, posts: &[ProcessedPost]) -> Vec<TopicCluster> {
        self.inner.cluster(posts).await
    }

    async fn summarize_batch(&self, clusters: &[TopicCluster], top3: &[ProcessedPost]) -> String {
        self.inner.summarize_batch(clusters, top3).await
    }
}

/// Puts everything into one cluster in reverse order.
struct ReversingSummarizer;

#[async_trait]
impl Summarizer for ReversingSummarizer {
    fn summarizer_name(&self) -> String {
        "reversing".to_string()
    }

    async fn summarize_post(&self, post: &Post) -> String {
        post.text.clone()
    }

    async fn cluster(&self, posts: &[ProcessedPost]) -> Vec<TopicCluster> {
        vec![TopicCluster::new("everything", posts.iter().rev().cloned().collect())]
    }

    async fn summarize_batch(&self, _clusters: &[TopicCluster], _top3: &[ProcessedPost]) -> String {
        "overview".to_string()
    }
}

fn post(id: &str, text: &str, likes: u64, retweets: u64, replies: u64) -> Post {
    Post::new(id, "author", text, now() - TimeDelta::minutes(5))
        .with_engagement(likes, retweets, replies)
}

fn scenario_posts() -> Vec<Post> {
    vec![
        post("001", "limited offer on my course, grab it today", 3, 0, 0),
        post("002", "lol", 40, 0, 0),
        post("003", "Reading notes on distributed consensus protocols!!", 10, 2, 1),
    ]
}

#[tokio::test]
async fn end_to_end_scenario() {
    init_tracing();

    let sink = Arc::new(RecordingSink::default());
    let summarizer = Arc::new(CountingSummarizer::default());
    let pipeline = DigestPipeline::builder()
        .feed(Arc::new(FixedFeed { posts: scenario_posts() }))
        .summarizer(summarizer.clone())
        .sink(sink.clone())
        .build()
        .unwrap();

    let report = pipeline.run_once(now()).await.unwrap();
    info!("Scenario report: {:?}", report);

    assert_eq!(report.fetched, 3);
    assert_eq!(report.rejected_ad, 1);
    assert_eq!(report.rejected_spam, 1);
    assert_eq!(report.accepted, 1);
    assert_eq!(report.ranked, 1);
    assert!(report.delivered);
    assert_eq!(summarizer.summaries.load(Ordering::SeqCst), 1);

    let batches = sink.batches.lock().await;
    assert_eq!(batches.len(), 1);
    let batch = &batches[0];

    let top3: Vec<&str> = batch.top3().iter().map(|p| p.id()).collect();
    assert_eq!(top3, vec!["003"]);
    assert!((batch.top3()[0].engagement_score() - 8.9).abs() < 1e-9);

    assert_eq!(batch.clusters().len(), 1);
    assert_eq!(batch.clusters()[0].name, "🎯 Other Updates");
    assert_eq!(
        batch.overview(),
        "Posts in this window center on \"Other Updates\" and related topics."
    );
    assert_eq!(batch.window().end(), now());
    assert_eq!(batch.window().start(), now() - TimeDelta::minutes(30));
    assert_eq!(
        batch.all_posts()[0].summary(),
        Some("Reading notes on distributed consensus protocols!!")
    );
}

#[tokio::test]
async fn empty_after_filter_skips_delivery() {
    init_tracing();

    let sink = Arc::new(RecordingSink::default());
    let summarizer = Arc::new(CountingSummarizer::default());
    let pipeline = DigestPipeline::builder()
        .feed(Arc::new(FixedFeed {
            posts: vec![post("1", "lol", 1, 0, 0), post("2", "huge SALE right now", 1, 0, 0)],
        }))
        .summarizer(summarizer.clone())
        .sink(sink.clone())
        .build()
        .unwrap();

    let report = pipeline.run_once(now()).await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.accepted, 0);
    assert!(!report.delivered);
    assert!(sink.batches.lock().await.is_empty());
    assert_eq!(summarizer.summaries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn checkpoint_prevents_reprocessing() {
    init_tracing();

    let store = Arc::new(InMemoryCheckpointStore::new());
    let sink = Arc::new(RecordingSink::default());
    let pipeline = DigestPipeline::builder()
        .feed(Arc::new(FixedFeed {
            posts: vec![
                post("100", "first legitimate post here", 1, 0, 0),
                post("105", "second legitimate post here", 1, 0, 0),
                post("102", "third legitimate post here", 1, 0, 0),
            ],
        }))
        .checkpoints(store.clone())
        .sink(sink.clone())
        .build()
        .unwrap();

    let first = pipeline.run_once(now()).await.unwrap();
    assert_eq!(first.fetched, 3);
    assert_eq!(store.load().await.unwrap().as_deref(), Some("105"));

    let second = pipeline.run_once(now()).await.unwrap();
    assert_eq!(second.fetched, 0);
    assert!(!second.delivered);
    assert_eq!(sink.batches.lock().await.len(), 1);
}

#[tokio::test]
async fn checkpoint_failure_aborts_run() {
    init_tracing();

    let sink = Arc::new(RecordingSink::default());
    let pipeline = DigestPipeline::builder()
        .feed(Arc::new(FixedFeed { posts: scenario_posts() }))
        .checkpoints(Arc::new(BrokenStore))
        .sink(sink.clone())
        .build()
        .unwrap();

    let result = pipeline.run_once(now()).await;
    assert!(matches!(result, Err(DigestError::Checkpoint(_))));
    assert!(sink.batches.lock().await.is_empty());
}

#[tokio::test]
async fn sink_failure_surfaces_as_delivery_error() {
    init_tracing();

    let pipeline = DigestPipeline::builder()
        .feed(Arc::new(FixedFeed { posts: scenario_posts() }))
        .sink(Arc::new(RejectingSink))
        .build()
        .unwrap();

    match pipeline.run_once(now()).await {
        Err(DigestError::Delivery { sink, reason }) => {
            assert_eq!(sink, "rejecting");
            assert!(reason.contains("read-only"));
        }
        other => panic!("expected a delivery error, got {:?}", other),
    }
}

#[test]
fn builder_requires_feed_and_sink() {
    let missing_sink = DigestPipeline::builder()
        .feed(Arc::new(FixedFeed { posts: Vec::new() }))
        .build();
    assert!(matches!(missing_sink, Err(DigestError::Config(_))));

    let missing_feed = DigestPipeline::builder()
        .sink(Arc::new(RecordingSink::default()))
        .build();
    assert!(matches!(missing_feed, Err(DigestError::Config(_))));

    let zero_top_n = DigestPipeline::builder()
        .feed(Arc::new(FixedFeed { posts: Vec::new() }))
        .sink(Arc::new(RecordingSink::default()))
        .ranking_stage(RankingStage::with_defaults(0))
        .build();
    assert!(matches!(zero_top_n, Err(DigestError::Config(_))));
}

#[test]
fn filtering_is_idempotent() {
    let stage = FilterStage::with_defaults(vec!["en".to_string(), "zh".to_string()]);
    let input: Vec<ProcessedPost> = vec![
        post("1", "A normal English post", 1, 0, 0).with_language("en"),
        post("2", "Un message en français", 1, 0, 0).with_language("fr"),
        post("3", "#a @b", 1, 0, 0),
        post("4", "Sponsored: best shoes", 1, 0, 0),
        post("5", "没有语言标签的帖子内容", 1, 0, 0),
    ]
    .into_iter()
    .map(ProcessedPost::new)
    .collect();

    let once = stage.filter(input);
    let twice = stage.filter(once.clone());
    let ids = |xs: &[ProcessedPost]| xs.iter().map(|p| p.id().to_string()).collect::<Vec<_>>();
    assert_eq!(ids(&once), vec!["1", "5"]);
    assert_eq!(ids(&twice), ids(&once));
}

#[test]
fn language_allow_list() {
    let stage = FilterStage::with_defaults(vec!["en".to_string(), "zh".to_string()]);
    let outcome = stage.partition(vec![
        ProcessedPost::new(post("fr", "Bonjour tout le monde", 1, 0, 0).with_language("fr")),
        ProcessedPost::new(post("none", "No language on this one", 1, 0, 0)),
        ProcessedPost::new(post("zh", "中文内容的帖子在这里", 1, 0, 0).with_language("ZH")),
    ]);

    let accepted: Vec<&str> = outcome.accepted.iter().map(|p| p.id()).collect();
    assert_eq!(accepted, vec!["none", "zh"]);
    let (rejected, _) = &outcome.rejected[0];
    assert_eq!(rejected.id(), "fr");
    assert!(!rejected.analysis.is_spam() && !rejected.analysis.is_ad());
}

#[test]
fn ranking_bound_and_order() {
    let ranking = RankingStage::with_defaults(25);
    // Scores 10, 50, 30 (likes weigh 0.5).
    let posts: Vec<ProcessedPost> = vec![
        post("a", "ten points", 20, 0, 0),
        post("b", "fifty points", 100, 0, 0),
        post("c", "thirty points", 60, 0, 0),
    ]
    .into_iter()
    .map(ProcessedPost::new)
    .collect();

    let top2 = ranking.select_top(posts.clone(), 2);
    let ids: Vec<&str> = top2.iter().map(|p| p.id()).collect();
    assert_eq!(ids, vec!["b", "c"]);

    assert_eq!(ranking.select_top(posts.clone(), 10).len(), 3);
    assert!(ranking.select_top(posts, 0).is_empty());
}

#[tokio::test]
async fn top3_ignores_cluster_order() {
    let assembler = DigestAssembler::new(Arc::new(ReversingSummarizer));
    // Scores 5, 100, 50, 20.
    let ranked: Vec<ProcessedPost> = vec![
        post("w", "five", 10, 0, 0),
        post("x", "hundred", 200, 0, 0),
        post("y", "fifty", 100, 0, 0),
        post("z", "twenty", 40, 0, 0),
    ]
    .into_iter()
    .map(ProcessedPost::new)
    .collect();

    let window = DigestWindow::trailing(now(), TimeDelta::minutes(30));
    let batch = assembler.build(ranked, window).await;
    let top3: Vec<&str> = batch.top3().iter().map(|p| p.id()).collect();
    assert_eq!(top3, vec!["x", "y", "z"]);
    assert_eq!(batch.clusters()[0].posts[0].id(), "z");
}

#[tokio::test]
async fn fallback_summary_cuts_long_text() {
    let text = "a".repeat(120);
    let summary = BaselineSummarizer::default()
        .summarize_post(&post("1", &text, 0, 0, 0))
        .await;
    assert_eq!(summary, format!("{}...", "a".repeat(80)));
}
