//! Integration tests for the crawl engine
//!
//! These tests use wiremock to create mock forum servers and exercise the
//! fetcher, post crawler, comment assembly and scheduler end-to-end.

use forum_harvest::config::{
    Config, CrawlerConfig, OutputConfig, ParserConfig, RateLimitConfig, RetryConfig, SiteConfig,
    UserAgentConfig,
};
use forum_harvest::crawler::{build_scheduler, crawl, PostCrawler, RetryingFetcher};
use forum_harvest::model::{Comment, ItemOutcome, Post};
use forum_harvest::output::StatsRecorder;
use forum_harvest::page::{PageParser, SelectorParser};
use forum_harvest::storage::{CheckpointStorage, JsonCheckpointStore};
use forum_harvest::url::SiteUrls;
use forum_harvest::FetchError;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, checkpoint_dir: &TempDir) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_workers: 3,
            checkpoint_interval: 1,
            request_timeout: 5_000,
        },
        rate_limit: RateLimitConfig {
            capacity: 1_000,
            refill_interval: 60_000,
            request_spacing: 0,
            poll_interval: 10,
        },
        retry: RetryConfig {
            max_rate_limit_retries: 3,
            backoff_min: 50,
            backoff_max: 50,
            backoff_cap: 1_000,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestHarvester".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        site: SiteConfig {
            base_url: base_url.to_string(),
            comments_path: "/svc/comments/{post_id}".to_string(),
            continuation_query: String::new(),
            post_id_prefix: String::new(),
        },
        output: OutputConfig {
            seeds_path: "./seeds.json".to_string(),
            checkpoint_dir: checkpoint_dir.path().to_string_lossy().into_owned(),
            results_dir: checkpoint_dir.path().join("raw").to_string_lossy().into_owned(),
        },
        parser: ParserConfig::default(),
    }
}

fn post_page(title: &str) -> String {
    format!(
        r#"<html><body>
        <shreddit-post post-title="{}" author="alice" score="12" upvote-ratio="0.9"
            comment-count="4" created-timestamp="2024-12-10T15:32:11.123000+0000">
          <div slot="text-body"><p>Body of {}</p></div>
        </shreddit-post>
        </body></html>"#,
        title, title
    )
}

const COMMENTS_WITH_CONTINUATION: &str = r#"
<shreddit-comment-tree>
  <shreddit-comment thingid="t1_a" depth="0" author="u1">
    <div id="t1_a-post-rtjson-content"><p>Root</p></div>
    <shreddit-comment thingid="t1_b" depth="1" author="u2">
      <div id="t1_b-post-rtjson-content"><p>Child</p></div>
      <shreddit-comment thingid="t1_c" depth="2" author="u3">
        <div id="t1_c-post-rtjson-content"><p>Grandchild</p></div>
      </shreddit-comment>
      <a slot="more-comments-permalink" href="/more?x=1">more replies</a>
    </shreddit-comment>
  </shreddit-comment>
</shreddit-comment-tree>
"#;

/// Continuation response; the depths it declares are not authoritative
const CONTINUATION_REPLIES: &str = r#"
<shreddit-comment thingid="t1_x" depth="0" author="u4">
  <div id="t1_x-post-rtjson-content">Late reply X</div>
</shreddit-comment>
<shreddit-comment thingid="t1_y" depth="0" author="u5">
  <div id="t1_y-post-rtjson-content">Late reply Y</div>
</shreddit-comment>
"#;

async fn mount_get(server: &MockServer, url_path: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn post_crawler(config: &Config) -> (PostCrawler, Arc<StatsRecorder>) {
    let stats = Arc::new(StatsRecorder::new());
    let fetcher = Arc::new(RetryingFetcher::from_config(config, Arc::clone(&stats)).unwrap());
    let parser: Arc<dyn PageParser> = Arc::new(SelectorParser::new(&config.parser).unwrap());
    let site = Arc::new(SiteUrls::from_config(&config.site).unwrap());
    (
        PostCrawler::new(fetcher, parser, site, Arc::clone(&stats)),
        stats,
    )
}

fn find<'a>(forest: &'a [Comment], id: &str) -> Option<&'a Comment> {
    let mut stack: Vec<&Comment> = forest.iter().collect();
    while let Some(comment) = stack.pop() {
        if comment.id == id {
            return Some(comment);
        }
        stack.extend(comment.replies.iter());
    }
    None
}

fn assert_depth_invariant(forest: &[Comment]) {
    let mut stack: Vec<&Comment> = forest.iter().collect();
    while let Some(comment) = stack.pop() {
        for reply in &comment.replies {
            assert_eq!(reply.depth, comment.depth + 1, "depth of {}", reply.id);
            assert_eq!(reply.parent_id.as_deref(), Some(comment.id.as_str()));
            stack.push(reply);
        }
    }
}

#[tokio::test]
async fn test_post_with_continuation_replies() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_get(&mock_server, "/r/test/comments/abc/first_post/", 200, &post_page("First")).await;
    mount_get(&mock_server, "/svc/comments/abc", 200, COMMENTS_WITH_CONTINUATION).await;
    Mock::given(method("GET"))
        .and(path("/more"))
        .and(query_param("x", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CONTINUATION_REPLIES))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (crawler, stats) = post_crawler(&config);
    let url = Url::parse(&format!("{}/r/test/comments/abc/first_post/", mock_server.uri())).unwrap();
    let post = crawler.crawl(&url).await.expect("post should be harvested");

    assert_eq!(post.post_id, "abc");
    assert_eq!(post.title, "First");
    assert_eq!(post.author, "alice");
    assert_eq!(post.score, 12);
    assert_eq!(post.comment_count, 4);
    assert_eq!(post.content, "Body of First");
    assert!(post.created_at.is_some());

    assert_eq!(post.comments.len(), 1);
    let b = find(&post.comments, "t1_b").unwrap();
    // One inline reply plus the two from the continuation
    assert_eq!(b.replies.len(), 3);
    assert_eq!(b.replies[0].id, "t1_c");
    for late in &b.replies[1..] {
        assert_eq!(late.parent_id.as_deref(), Some("t1_b"));
        assert_eq!(late.depth, b.depth + 1);
    }
    assert_eq!(find(&post.comments, "t1_x").unwrap().text.as_deref(), Some("Late reply X"));
    assert_depth_invariant(&post.comments);
    assert_eq!(post.total_comments(), 5);

    let statistics = stats.snapshot();
    assert_eq!(statistics.continuations_resolved, 1);
    assert_eq!(statistics.outcome(ItemOutcome::Completed), 1);
    assert_eq!(statistics.requests, 3);
}

#[tokio::test]
async fn test_failed_continuation_keeps_existing_replies() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_get(&mock_server, "/r/test/comments/abc/t/", 200, &post_page("T")).await;
    mount_get(&mock_server, "/svc/comments/abc", 200, COMMENTS_WITH_CONTINUATION).await;
    mount_get(&mock_server, "/more", 500, "").await;

    let (crawler, stats) = post_crawler(&config);
    let url = Url::parse(&format!("{}/r/test/comments/abc/t/", mock_server.uri())).unwrap();
    let post = crawler.crawl(&url).await.unwrap();

    let b = find(&post.comments, "t1_b").unwrap();
    assert_eq!(b.replies.len(), 1);
    assert_eq!(b.replies[0].id, "t1_c");
    assert_eq!(stats.snapshot().continuations_failed, 1);
}

#[tokio::test]
async fn test_missing_post_marker_yields_nothing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_get(
        &mock_server,
        "/r/test/comments/gone/t/",
        200,
        "<html><body><p>This post was removed</p></body></html>",
    )
    .await;

    let url = Url::parse(&format!("{}/r/test/comments/gone/t/", mock_server.uri())).unwrap();

    let (crawler, stats) = post_crawler(&config);
    assert!(crawler.crawl(&url).await.is_none());
    assert_eq!(stats.snapshot().outcome(ItemOutcome::MarkerMissing), 1);

    let posts = crawl(&config, vec![url]).await.unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn test_comments_failure_keeps_post() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_get(&mock_server, "/r/test/comments/abc/t/", 200, &post_page("T")).await;
    mount_get(&mock_server, "/svc/comments/abc", 503, "").await;

    let (crawler, _) = post_crawler(&config);
    let url = Url::parse(&format!("{}/r/test/comments/abc/t/", mock_server.uri())).unwrap();
    let post = crawler.crawl(&url).await.unwrap();

    assert_eq!(post.post_id, "abc");
    assert!(post.comments.is_empty());
}

#[tokio::test]
async fn test_url_without_post_id_falls_back_to_url() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_get(&mock_server, "/p/standalone", 200, &post_page("Standalone")).await;

    let (crawler, stats) = post_crawler(&config);
    let url = Url::parse(&format!("{}/p/standalone", mock_server.uri())).unwrap();
    let post = crawler.crawl(&url).await.unwrap();

    assert_eq!(post.post_id, url.as_str());
    assert!(post.comments.is_empty());
    // Only the post page; no comments endpoint without an id
    assert_eq!(stats.requests(), 1);
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .mount(&mock_server)
        .await;
    mount_get(&mock_server, "/busy", 200, "finally").await;

    let stats = Arc::new(StatsRecorder::new());
    let fetcher = RetryingFetcher::from_config(&config, Arc::clone(&stats)).unwrap();
    let url = Url::parse(&format!("{}/busy", mock_server.uri())).unwrap();

    let start = Instant::now();
    let body = fetcher.fetch(&url).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(body, "finally");
    // 50ms, 100ms, 200ms backoffs
    assert!(elapsed >= Duration::from_millis(350), "elapsed {:?}", elapsed);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 4);

    let statistics = stats.snapshot();
    assert_eq!(statistics.requests, 4);
    assert_eq!(statistics.rate_limit_retries, 3);
}

#[tokio::test]
async fn test_rate_limit_retries_exhausted() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), &dir);
    config.retry.max_rate_limit_retries = 2;
    config.retry.backoff_min = 5;
    config.retry.backoff_max = 5;

    mount_get(&mock_server, "/busy", 429, "").await;

    let fetcher = RetryingFetcher::from_config(&config, Arc::new(StatsRecorder::new())).unwrap();
    let url = Url::parse(&format!("{}/busy", mock_server.uri())).unwrap();

    match fetcher.fetch(&url).await {
        Err(FetchError::RateLimited { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_classification() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_get(&mock_server, "/missing", 404, "").await;
    mount_get(&mock_server, "/broken", 500, "").await;

    let fetcher = RetryingFetcher::from_config(&config, Arc::new(StatsRecorder::new())).unwrap();

    let missing = Url::parse(&format!("{}/missing", mock_server.uri())).unwrap();
    assert!(matches!(
        fetcher.fetch(&missing).await,
        Err(FetchError::Permanent { status: 404, .. })
    ));

    let broken = Url::parse(&format!("{}/broken", mock_server.uri())).unwrap();
    assert!(matches!(
        fetcher.fetch(&broken).await,
        Err(FetchError::Transient { .. })
    ));

    // Neither is retried
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), &dir);
    config.crawler.request_timeout = 200;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let fetcher = RetryingFetcher::from_config(&config, Arc::new(StatsRecorder::new())).unwrap();
    let url = Url::parse(&format!("{}/slow", mock_server.uri())).unwrap();
    assert!(matches!(
        fetcher.fetch(&url).await,
        Err(FetchError::Transient { .. })
    ));
}

#[tokio::test]
async fn test_scheduler_streams_and_checkpoints() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    let mut urls = Vec::new();
    for id in ["p1", "p2", "p3", "p4"] {
        let page = format!("/r/test/comments/{}/t/", id);
        mount_get(&mock_server, &page, 200, &post_page(id)).await;
        mount_get(&mock_server, &format!("/svc/comments/{}", id), 200, "").await;
        urls.push(Url::parse(&format!("{}{}", mock_server.uri(), page)).unwrap());
    }
    let bad = format!("{}/r/test/comments/bad/t/", mock_server.uri());
    mount_get(&mock_server, "/r/test/comments/bad/t/", 404, "").await;
    urls.push(Url::parse(&bad).unwrap());

    let store = JsonCheckpointStore::new(dir.path());
    let scheduler = build_scheduler(&config, Box::new(store.clone())).unwrap();
    let mut stream = scheduler.run(urls);

    let mut streamed = Vec::new();
    while let Some(post) = stream.next().await {
        streamed.push(post.post_id);
    }
    let report = stream.finish().await;

    streamed.sort();
    assert_eq!(streamed, vec!["p1", "p2", "p3", "p4"]);
    assert!(report.posts.is_empty());
    assert_eq!(report.statistics.outcome(ItemOutcome::Completed), 4);
    assert_eq!(report.statistics.outcome(ItemOutcome::FetchFailed), 1);
    assert_eq!(report.statistics.checkpoint_flushes, 4);

    let checkpoint = store.load().unwrap();
    assert_eq!(checkpoint.len(), 4);
}

/// Serves a post page after a fixed delay, noting when each request arrived
struct DelayedPostPage {
    delay: Duration,
    arrivals: Arc<Mutex<Vec<Instant>>>,
}

impl Respond for DelayedPostPage {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_string(post_page("Slow"))
            .set_delay(self.delay)
    }
}

/// Largest number of requests that arrived within `window` of each other
fn peak_in_flight(arrivals: &[Instant], window: Duration) -> usize {
    arrivals
        .iter()
        .map(|&t| {
            arrivals
                .iter()
                .filter(|&&a| a <= t && t.duration_since(a) < window)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_scheduler_respects_max_workers() {
    const DELAY: Duration = Duration::from_millis(300);

    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&mock_server.uri(), &dir);
    config.crawler.max_workers = 2;

    let arrivals = Arc::new(Mutex::new(Vec::new()));
    Mock::given(method("GET"))
        .and(path_regex(r"^/p/\d+$"))
        .respond_with(DelayedPostPage {
            delay: DELAY,
            arrivals: Arc::clone(&arrivals),
        })
        .expect(6)
        .mount(&mock_server)
        .await;

    // No post id in these URLs, so each crawl is exactly one request
    let urls = (0..6)
        .map(|i| Url::parse(&format!("{}/p/{}", mock_server.uri(), i)).unwrap())
        .collect();

    let start = Instant::now();
    let report = build_scheduler(&config, Box::new(JsonCheckpointStore::new(dir.path())))
        .unwrap()
        .run(urls)
        .finish()
        .await;
    let elapsed = start.elapsed();

    assert_eq!(report.posts.len(), 6);
    assert_eq!(report.statistics.outcome(ItemOutcome::Completed), 6);

    // A slot frees only after its response, which comes DELAY after arrival
    let arrivals = arrivals.lock().unwrap().clone();
    assert_eq!(arrivals.len(), 6);
    let peak = peak_in_flight(&arrivals, DELAY - Duration::from_millis(50));
    assert!(peak <= 2, "{} requests in flight with max_workers = 2", peak);
    assert!(
        elapsed >= DELAY * 3,
        "Six delayed posts through two workers took only {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_resume_merges_into_existing_checkpoint() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    let mut store = JsonCheckpointStore::new(dir.path());
    let stale = |id: &str| Post {
        post_id: id.to_string(),
        url: format!("{}/r/test/comments/{}/t/", mock_server.uri(), id),
        title: "stale".to_string(),
        author: "old".to_string(),
        created_at: None,
        score: 0,
        upvote_ratio: 0.0,
        content: String::new(),
        comment_count: 0,
        image_url: None,
        comments: Vec::new(),
        fetched_at: chrono::Utc::now(),
    };
    store.flush(&[stale("A"), stale("B")]).unwrap();

    let mut urls = Vec::new();
    for id in ["B", "C"] {
        let page = format!("/r/test/comments/{}/t/", id);
        mount_get(&mock_server, &page, 200, &post_page(&format!("fresh {}", id))).await;
        mount_get(&mock_server, &format!("/svc/comments/{}", id), 200, "").await;
        urls.push(Url::parse(&format!("{}{}", mock_server.uri(), page)).unwrap());
    }

    let posts = crawl(&config, urls).await.unwrap();
    assert_eq!(posts.len(), 2);

    let checkpoint = store.load().unwrap();
    let entries: Vec<_> = checkpoint
        .posts()
        .iter()
        .map(|p| (p.post_id.as_str(), p.title.as_str()))
        .collect();
    assert_eq!(
        entries,
        vec![("A", "stale"), ("B", "fresh B"), ("C", "fresh C")]
    );
}

#[tokio::test]
async fn test_cancelled_run_yields_nothing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), &dir);

    mount_get(&mock_server, "/r/test/comments/abc/t/", 200, &post_page("T")).await;
    let urls = vec![
        Url::parse(&format!("{}/r/test/comments/abc/t/", mock_server.uri())).unwrap(),
        Url::parse(&format!("{}/r/test/comments/def/t/", mock_server.uri())).unwrap(),
    ];

    let scheduler =
        build_scheduler(&config, Box::new(JsonCheckpointStore::new(dir.path()))).unwrap();
    scheduler.cancellation_token().cancel();
    let report = scheduler.run(urls).finish().await;

    assert!(report.posts.is_empty());
    assert_eq!(report.statistics.outcome(ItemOutcome::Cancelled), 2);
    assert_eq!(report.statistics.requests, 0);
}
