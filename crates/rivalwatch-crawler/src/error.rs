use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("empty response body from {url}")]
    EmptyBody { url: String },

    #[error("fetch of {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("worker process failed: {0}")]
    Worker(String),

    #[error("worker process exceeded {secs}s")]
    WorkerTimeout { secs: u64 },

    #[error("worker protocol error: {0}")]
    WorkerProtocol(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start isolated scheduler: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CrawlError {
    /// The target answered but its response is unusable, as opposed to the
    /// fetch itself breaking.
    #[must_use]
    pub fn is_target_failure(&self) -> bool {
        matches!(
            self,
            CrawlError::UnexpectedStatus { .. } | CrawlError::EmptyBody { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_status_and_empty_body_are_target_failures() {
        let status = CrawlError::UnexpectedStatus {
            status: 404,
            url: "https://acme.example".to_string(),
        };
        let runtime = CrawlError::Runtime(std::io::Error::other("no threads"));
        assert!(status.is_target_failure());
        assert!(!runtime.is_target_failure());
        assert_eq!(
            runtime.to_string(),
            "failed to start isolated scheduler: no threads"
        );
    }
}
