use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::normalize_url;
use crate::{ConfigError, CoreError};

/// A content source a competitor can be monitored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Website,
    Browser,
    Rss,
    Youtube,
    Twitter,
    Instagram,
    Linkedin,
    Facebook,
    Tiktok,
}

impl Platform {
    pub const ALL: [Platform; 9] = [
        Platform::Website,
        Platform::Browser,
        Platform::Rss,
        Platform::Youtube,
        Platform::Twitter,
        Platform::Instagram,
        Platform::Linkedin,
        Platform::Facebook,
        Platform::Tiktok,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Website => "website",
            Platform::Browser => "browser",
            Platform::Rss => "rss",
            Platform::Youtube => "youtube",
            Platform::Twitter => "twitter",
            Platform::Instagram => "instagram",
            Platform::Linkedin => "linkedin",
            Platform::Facebook => "facebook",
            Platform::Tiktok => "tiktok",
        }
    }

    /// Platforms fetched by the crawl engine rather than a platform collector.
    #[must_use]
    pub fn is_crawlable(self) -> bool {
        matches!(self, Platform::Website | Platform::Browser)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == lowered)
            .ok_or_else(|| CoreError::InvalidPlatform(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitorStatus {
    #[default]
    Active,
    Paused,
    Error,
}

impl CompetitorStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CompetitorStatus::Active => "active",
            CompetitorStatus::Paused => "paused",
            CompetitorStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for CompetitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompetitorStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CompetitorStatus::Active),
            "paused" => Ok(CompetitorStatus::Paused),
            "error" => Ok(CompetitorStatus::Error),
            other => Err(CoreError::InvalidCompetitorStatus(other.to_string())),
        }
    }
}

/// A tracked competitor as stored by the data store. Read-only to the scan pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    pub id: i64,
    pub name: String,
    pub website_url: Option<String>,
    pub handles: BTreeMap<Platform, String>,
    pub platforms: Vec<Platform>,
    pub scan_frequency_minutes: u32,
    pub status: CompetitorStatus,
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl Competitor {
    /// URLs the crawl engine should fetch for a crawlable platform.
    ///
    /// Handles may hold several URLs separated by commas or whitespace. The
    /// website URL always comes first for [`Platform::Website`] and is the
    /// fallback for [`Platform::Browser`] when no browser handle is set.
    /// URLs that normalize to the same page are kept once, first spelling wins.
    #[must_use]
    pub fn crawl_targets(&self, platform: Platform) -> Vec<String> {
        let from_handle = self
            .handles
            .get(&platform)
            .map(|raw| split_handle_urls(raw))
            .unwrap_or_default();

        let mut targets: Vec<String> = match platform {
            Platform::Website => self
                .website_url
                .iter()
                .cloned()
                .chain(from_handle)
                .collect(),
            Platform::Browser if from_handle.is_empty() => {
                self.website_url.iter().cloned().collect()
            }
            Platform::Browser => from_handle,
            _ => Vec::new(),
        };

        // Spellings of one page share a post identity, so crawl it once.
        let mut seen = HashSet::new();
        targets.retain(|url| seen.insert(normalize_url(url)));
        targets
    }

    #[must_use]
    pub fn handle(&self, platform: Platform) -> Option<&str> {
        self.handles
            .get(&platform)
            .map(String::as_str)
            .filter(|h| !h.trim().is_empty())
    }
}

fn split_handle_urls(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// One competitor entry from the seed YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorConfig {
    pub name: String,
    pub website_url: Option<String>,
    #[serde(default)]
    pub handles: BTreeMap<Platform, String>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default = "default_scan_frequency")]
    pub scan_frequency_minutes: u32,
    #[serde(default)]
    pub status: CompetitorStatus,
}

fn default_scan_frequency() -> u32 {
    1440
}

#[derive(Debug, Deserialize)]
pub struct CompetitorsFile {
    pub competitors: Vec<CompetitorConfig>,
}

/// Load and validate the competitor seed file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_competitors(path: &Path) -> Result<CompetitorsFile, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::CompetitorsFileIo {
            path: path.display().to_string(),
            source: e,
        })?;

    let file: CompetitorsFile = serde_yaml::from_str(&content)?;
    validate_competitors(&file)?;
    Ok(file)
}

fn validate_competitors(file: &CompetitorsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for competitor in &file.competitors {
        if competitor.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "competitor name must be non-empty".to_string(),
            ));
        }

        if !seen_names.insert(competitor.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate competitor name: '{}'",
                competitor.name
            )));
        }

        if competitor.scan_frequency_minutes == 0 {
            return Err(ConfigError::Validation(format!(
                "competitor '{}' has scan_frequency_minutes 0; must be at least 1",
                competitor.name
            )));
        }

        for platform in &competitor.platforms {
            let has_target = match platform {
                Platform::Website | Platform::Browser => {
                    competitor.website_url.is_some() || competitor.handles.contains_key(platform)
                }
                other => competitor.handles.contains_key(other),
            };
            if !has_target {
                return Err(ConfigError::Validation(format!(
                    "competitor '{}' monitors {platform} but has no URL or handle for it",
                    competitor.name
                )));
            }
        }
    }

    Ok(())
}
