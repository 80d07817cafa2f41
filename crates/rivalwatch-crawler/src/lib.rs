pub mod context;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod settings;
pub mod worker;

pub use context::{FetchContext, HttpContext};
pub use engine::{crawl_url, crawl_with_context, select_dispatch, CrawlEngine, Dispatch};
pub use error::CrawlError;
pub use extract::{ExtractionAdapter, ExtractionOutcome, LlmExtractor};
pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
pub use normalize::{normalize_body, NormalizedPage};
pub use settings::{EngineSettings, FetchSettings};
pub use worker::{
    handle_request, run_worker_stdio, ProcessLauncher, WorkerLauncher, WorkerRequest,
    WorkerResponse, WORKER_ARG,
};
