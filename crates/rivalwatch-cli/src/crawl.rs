//! Ad-hoc crawl command: runs the crawl engine directly and prints results as
//! JSON on stdout. Nothing is persisted.

use anyhow::Context;
use rivalwatch_core::{AppConfig, CrawlResult, ExtractionConfig, IsolationStrategy};
use rivalwatch_crawler::{CrawlEngine, EngineSettings};

pub(crate) async fn run_crawl(
    config: &AppConfig,
    urls: &[String],
    strategy: Option<IsolationStrategy>,
    instruction: Option<String>,
    schema: Option<&str>,
    provider: Option<String>,
) -> anyhow::Result<()> {
    let extraction = build_extraction(instruction, schema, provider)?;
    let strategy = strategy.unwrap_or(config.crawl_strategy);

    tracing::info!(
        urls = urls.len(),
        %strategy,
        extraction = extraction.enabled,
        "crawl started"
    );
    let engine = CrawlEngine::from_settings(EngineSettings::from_app_config(config))?;
    let results = engine.crawl_batch(urls, &extraction, strategy).await;
    let failed = failed_count(&results);
    tracing::info!(
        succeeded = results.len() - failed,
        failed,
        "crawl finished"
    );

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn failed_count(results: &[CrawlResult]) -> usize {
    results.iter().filter(|r| !r.is_success()).count()
}

/// Extraction turns on when an instruction or a schema is given.
fn build_extraction(
    instruction: Option<String>,
    schema: Option<&str>,
    provider: Option<String>,
) -> anyhow::Result<ExtractionConfig> {
    let schema = schema
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--schema is not valid JSON")?;

    let extraction = ExtractionConfig {
        enabled: instruction.is_some() || schema.is_some(),
        provider,
        schema,
        instruction,
        ..ExtractionConfig::default()
    };
    extraction.validate()?;
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_count_ignores_successes() {
        let results = vec![
            CrawlResult::error("https://a.example", "boom"),
            CrawlResult::error("https://b.example", "boom"),
        ];
        assert_eq!(failed_count(&results), 2);
        assert_eq!(failed_count(&[]), 0);
    }

    #[test]
    fn no_instruction_or_schema_leaves_extraction_off() {
        let config = build_extraction(None, None, None).unwrap();
        assert!(!config.enabled);
    }

    #[test]
    fn instruction_enables_extraction() {
        let config =
            build_extraction(Some("list prices".to_string()), None, None).unwrap();
        assert!(config.enabled);
        assert_eq!(config.instruction.as_deref(), Some("list prices"));
    }

    #[test]
    fn schema_is_parsed_as_json() {
        let config = build_extraction(None, Some(r#"{"type":"object"}"#), None).unwrap();
        assert!(config.enabled);
        assert_eq!(config.schema, Some(serde_json::json!({"type": "object"})));
    }

    #[test]
    fn malformed_schema_is_rejected() {
        assert!(build_extraction(None, Some("{not json"), None).is_err());
    }

    #[test]
    fn non_object_schema_fails_validation() {
        assert!(build_extraction(None, Some("[1, 2]"), None).is_err());
    }

    #[test]
    fn provider_must_name_vendor_and_model() {
        assert!(build_extraction(
            Some("x".to_string()),
            None,
            Some("gpt-4o".to_string())
        )
        .is_err());
    }
}
