//! `ProcessLauncher` against real child processes: `/bin/sh` scripts stand in
//! for a worker that crashes, prints garbage, or hangs.
#![cfg(unix)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rivalwatch_core::{CrawlStatus, ExtractionConfig, IsolationStrategy, ProcessMode};
use rivalwatch_crawler::{
    handle_request, CrawlEngine, CrawlError, EngineSettings, ExtractionAdapter,
    ExtractionOutcome, FetchContext, FetchSettings, FetchedPage, PageFetcher, ProcessLauncher,
    WorkerLauncher, WorkerRequest, WorkerResponse,
};

fn shell(script: &str, timeout: Duration) -> ProcessLauncher {
    ProcessLauncher::new(PathBuf::from("/bin/sh"), timeout)
        .with_args(vec!["-c".to_string(), script.to_string()])
}

fn request(urls: &[&str]) -> WorkerRequest {
    WorkerRequest {
        urls: urls.iter().map(|url| (*url).to_string()).collect(),
        extraction: ExtractionConfig::disabled(),
        settings: FetchSettings::default(),
    }
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn well_formed_worker_output_is_decoded() {
    let launcher = shell(
        r#"cat >/dev/null; printf '{"results":[]}'"#,
        Duration::from_secs(5),
    );

    let response = launcher.run(request(&["u1"])).await.unwrap();

    assert!(response.results.is_empty());
}

#[tokio::test]
async fn non_zero_exit_fails_the_unit() {
    let launcher = shell("cat >/dev/null; exit 3", Duration::from_secs(5));

    let err = launcher.run(request(&["u1"])).await.unwrap_err();

    assert!(
        matches!(&err, CrawlError::Worker(msg) if msg.contains("exited")),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn malformed_stdout_is_a_protocol_error() {
    let launcher = shell("cat >/dev/null; echo not-json", Duration::from_secs(5));

    let err = launcher.run(request(&["u1"])).await.unwrap_err();

    assert!(
        matches!(err, CrawlError::WorkerProtocol(_)),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn hung_worker_is_killed_at_the_timeout() {
    let launcher = shell("cat >/dev/null; sleep 5", Duration::from_secs(1));

    let started = std::time::Instant::now();
    let err = launcher.run(request(&["u1"])).await.unwrap_err();

    assert!(
        matches!(err, CrawlError::WorkerTimeout { secs: 1 }),
        "unexpected error: {err}"
    );
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn missing_program_is_an_io_error() {
    let launcher = ProcessLauncher::new(
        PathBuf::from("/nonexistent/rivalwatch-worker"),
        Duration::from_secs(1),
    );

    let err = launcher.run(request(&["u1"])).await.unwrap_err();

    assert!(matches!(err, CrawlError::Io(_)), "unexpected error: {err}");
}

// ---------------------------------------------------------------------------
// Engine with real worker processes
// ---------------------------------------------------------------------------

struct HtmlFetcher;

#[async_trait]
impl PageFetcher for HtmlFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, CrawlError> {
        Ok(FetchedPage {
            url: url.to_string(),
            content_type: Some("text/html".to_string()),
            body: format!("<p>{url}</p>"),
        })
    }
}

struct NoopExtractor;

#[async_trait]
impl ExtractionAdapter for NoopExtractor {
    async fn extract(&self, _content: &str, _config: &ExtractionConfig) -> ExtractionOutcome {
        ExtractionOutcome::passthrough()
    }
}

#[derive(Clone, Copy)]
struct EveryPageServes;

impl FetchContext for EveryPageServes {
    fn fetcher(&self, _settings: &FetchSettings) -> Result<Arc<dyn PageFetcher>, CrawlError> {
        Ok(Arc::new(HtmlFetcher))
    }

    fn extractor(
        &self,
        _settings: &FetchSettings,
    ) -> Result<Arc<dyn ExtractionAdapter>, CrawlError> {
        Ok(Arc::new(NoopExtractor))
    }
}

/// Sends any unit containing `crashing_url` to a real worker process that
/// dies; every other unit is handled in-process.
struct CrashOn {
    crashing_url: &'static str,
    crashing: ProcessLauncher,
}

#[async_trait]
impl WorkerLauncher for CrashOn {
    async fn run(&self, request: WorkerRequest) -> Result<WorkerResponse, CrawlError> {
        if request.urls.iter().any(|url| url == self.crashing_url) {
            return self.crashing.run(request).await;
        }
        Ok(handle_request(request, &EveryPageServes).await)
    }
}

fn settings() -> EngineSettings {
    EngineSettings {
        fetch: FetchSettings {
            inter_fetch_delay_ms: 0,
            ..FetchSettings::default()
        },
        worker_pool_size: 2,
        batch_size: 2,
        ..EngineSettings::default()
    }
}

#[tokio::test]
async fn crashed_worker_process_fails_only_its_batch() {
    let launcher = CrashOn {
        crashing_url: "u3",
        crashing: shell("cat >/dev/null; exit 3", Duration::from_secs(5)),
    };
    let engine = CrawlEngine::new(settings(), Arc::new(EveryPageServes), Arc::new(launcher));

    let results = engine
        .crawl_batch(
            &["u1", "u2", "u3", "u4"].map(str::to_string),
            &ExtractionConfig::disabled(),
            IsolationStrategy::Process(ProcessMode::Batched),
        )
        .await;

    assert_eq!(results.len(), 4);
    let by_url: HashMap<_, _> = results.iter().map(|r| (r.url.as_str(), r)).collect();
    assert_eq!(by_url["u1"].status, CrawlStatus::Success);
    assert_eq!(by_url["u2"].status, CrawlStatus::Success);
    for url in ["u3", "u4"] {
        assert_eq!(by_url[url].status, CrawlStatus::Error);
        assert!(by_url[url]
            .error
            .as_deref()
            .is_some_and(|msg| msg.contains("worker unit failed")));
    }
}

#[tokio::test]
async fn hung_worker_process_fails_every_url_it_held() {
    let engine = CrawlEngine::new(
        settings(),
        Arc::new(EveryPageServes),
        Arc::new(shell("cat >/dev/null; sleep 5", Duration::from_secs(1))),
    );

    let results = engine
        .crawl_batch(
            &["u1", "u2"].map(str::to_string),
            &ExtractionConfig::disabled(),
            IsolationStrategy::Process(ProcessMode::Individual),
        )
        .await;

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == CrawlStatus::Error
        && r.error.as_deref().is_some_and(|msg| msg.contains("exceeded 1s"))));
}
