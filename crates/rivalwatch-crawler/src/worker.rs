//! Worker-process protocol.
//!
//! The parent writes one JSON [`WorkerRequest`] to the worker's stdin and
//! closes it; the worker crawls the URLs sequentially and writes one JSON
//! [`WorkerResponse`] to stdout. Logs go to stderr. Anything else (non-zero
//! exit, malformed output, timeout) fails the whole unit.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rivalwatch_core::{CrawlResult, ExtractionConfig};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::context::{FetchContext, HttpContext};
use crate::engine::{crawl_url, UnavailableExtractor};
use crate::error::CrawlError;
use crate::extract::ExtractionAdapter;
use crate::settings::{EngineSettings, FetchSettings};

/// Argument that switches a rivalwatch binary into worker mode.
pub const WORKER_ARG: &str = "crawl-worker";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub urls: Vec<String>,
    pub extraction: ExtractionConfig,
    pub settings: FetchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub results: Vec<CrawlResult>,
}

/// Runs one isolation unit somewhere else and returns its results.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// # Errors
    ///
    /// Any error fails every URL of the unit.
    async fn run(&self, request: WorkerRequest) -> Result<WorkerResponse, CrawlError>;
}

/// Spawns a fresh OS process per unit.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self {
            program,
            args: vec![WORKER_ARG.to_string()],
            timeout,
        }
    }

    /// Worker binary from settings, or the running executable.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if the current executable path is unavailable.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self, CrawlError> {
        let program = match &settings.worker_bin {
            Some(path) => path.clone(),
            None => std::env::current_exe()?,
        };
        Ok(Self::new(
            program,
            Duration::from_secs(settings.worker_timeout_secs),
        ))
    }

    /// Replace the arguments passed to the worker program.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn run(&self, request: WorkerRequest) -> Result<WorkerResponse, CrawlError> {
        let payload = serde_json::to_vec(&request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CrawlError::Worker("worker stdin unavailable".to_string()))?;
        stdin.write_all(&payload).await?;
        stdin.shutdown().await?;
        drop(stdin);

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CrawlError::WorkerTimeout {
                secs: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            return Err(CrawlError::Worker(format!(
                "worker exited with {}",
                output.status
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Crawl a request's URLs sequentially, pausing between fetches.
///
/// Collaborators are built once per request since the whole request already
/// runs in its own process.
pub async fn handle_request(request: WorkerRequest, context: &dyn FetchContext) -> WorkerResponse {
    let WorkerRequest {
        urls,
        extraction,
        settings,
    } = request;

    let fetcher = match context.fetcher(&settings) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            let message = format!("failed to build fetcher: {e}");
            return WorkerResponse {
                results: urls
                    .into_iter()
                    .map(|url| CrawlResult::error(url, message.as_str()))
                    .collect(),
            };
        }
    };
    let extractor: Arc<dyn ExtractionAdapter> =
        context.extractor(&settings).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to build extractor");
            Arc::new(UnavailableExtractor)
        });

    let delay = Duration::from_millis(settings.inter_fetch_delay_ms);
    let mut results = Vec::with_capacity(urls.len());
    for (idx, url) in urls.iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        results.push(
            crawl_url(
                url,
                &extraction,
                &settings,
                fetcher.as_ref(),
                extractor.as_ref(),
            )
            .await,
        );
    }

    WorkerResponse { results }
}

/// Worker entry point: read a request from stdin, write the response to
/// stdout.
///
/// # Errors
///
/// Returns [`CrawlError::Io`] on stdio failure or
/// [`CrawlError::WorkerProtocol`] if the request cannot be decoded.
pub async fn run_worker_stdio() -> Result<(), CrawlError> {
    let mut input = Vec::new();
    tokio::io::stdin().read_to_end(&mut input).await?;
    let request: WorkerRequest = serde_json::from_slice(&input)?;
    tracing::debug!(url_count = request.urls.len(), "worker received request");

    let response = handle_request(request, &HttpContext).await;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&serde_json::to_vec(&response)?).await?;
    stdout.flush().await?;
    Ok(())
}
