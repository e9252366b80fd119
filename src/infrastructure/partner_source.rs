//! Partner list sources
//!
//! A source yields raw `(url, status)` entries. [`load_partner_list`] turns
//! them into the normalized, filtered and de-duplicated [`PartnerList`] a
//! scan runs over.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::{LaunchStatus, PartnerDescriptor, PartnerList};
use crate::infrastructure::config::{defaults, PartnersConfig};

/// One row of a partner list before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerEntry {
    pub url: String,
    pub status: LaunchStatus,
}

impl PartnerEntry {
    pub fn launched(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: LaunchStatus::Launched,
        }
    }
}

#[async_trait]
pub trait PartnerSource: Send + Sync {
    async fn load(&self) -> Result<Vec<PartnerEntry>>;

    /// Short label for logs
    fn describe(&self) -> String;
}

/// Explicit list from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticPartnerSource {
    entries: Vec<PartnerEntry>,
}

impl StaticPartnerSource {
    pub fn new(entries: Vec<PartnerEntry>) -> Self {
        Self { entries }
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(urls.into_iter().map(PartnerEntry::launched).collect())
    }
}

#[async_trait]
impl PartnerSource for StaticPartnerSource {
    async fn load(&self) -> Result<Vec<PartnerEntry>> {
        Ok(self.entries.clone())
    }

    fn describe(&self) -> String {
        format!("static list ({} entries)", self.entries.len())
    }
}

/// Text file with one `URL[,status]` per line; `#` starts a comment
#[derive(Debug, Clone)]
pub struct FilePartnerSource {
    path: PathBuf,
}

impl FilePartnerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PartnerSource for FilePartnerSource {
    async fn load(&self) -> Result<Vec<PartnerEntry>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read partner file {:?}", self.path))?;
        Ok(parse_entries(&content, false))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Published spreadsheet CSV export with `URL,Status` columns and a header row
#[derive(Debug, Clone)]
pub struct SheetCsvPartnerSource {
    url: String,
    client: Client,
}

impl SheetCsvPartnerSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client for partner sheet")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl PartnerSource for SheetCsvPartnerSource {
    async fn load(&self) -> Result<Vec<PartnerEntry>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch partner sheet {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Partner sheet returned HTTP {status}: {}", self.url));
        }

        let body = response
            .text()
            .await
            .context("Failed to read partner sheet body")?;
        let entries = parse_entries(&body, true);
        info!("✅ Loaded {} rows from partner sheet", entries.len());
        Ok(entries)
    }

    fn describe(&self) -> String {
        format!("sheet {}", self.url)
    }
}

/// Tries `primary`, and on failure logs a warning and uses `fallback`
pub struct FallbackPartnerSource {
    primary: Box<dyn PartnerSource>,
    fallback: Box<dyn PartnerSource>,
}

impl FallbackPartnerSource {
    pub fn new(primary: Box<dyn PartnerSource>, fallback: Box<dyn PartnerSource>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl PartnerSource for FallbackPartnerSource {
    async fn load(&self) -> Result<Vec<PartnerEntry>> {
        match self.primary.load().await {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "⚠️ Partner source {} failed: {:#}. Falling back to {}",
                    self.primary.describe(),
                    e,
                    self.fallback.describe()
                );
                self.fallback.load().await
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} (fallback: {})", self.primary.describe(), self.fallback.describe())
    }
}

/// Parse `URL[,status]` rows. Blank lines, `#` comments and rows without a URL are skipped.
pub fn parse_entries(content: &str, skip_header: bool) -> Vec<PartnerEntry> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(skip_header)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(content.trim_start_matches('\u{feff}').as_bytes());

    let mut entries = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("⚠️ Skipping unreadable partner row: {}", e);
                continue;
            }
        };
        let Some(url) = record.get(0).filter(|u| !u.is_empty()) else {
            continue;
        };
        let status = record
            .get(1)
            .filter(|s| !s.is_empty())
            .map_or(LaunchStatus::Launched, LaunchStatus::parse);
        entries.push(PartnerEntry {
            url: url.to_string(),
            status,
        });
    }
    entries
}

/// Partner URLs always end with `/`
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Load, normalize, filter, de-duplicate and optionally sort
pub async fn load_partner_list(
    source: &dyn PartnerSource,
    include_not_launched: bool,
    sort_alphabetically: bool,
) -> Result<PartnerList> {
    let entries = source.load().await?;
    let raw_count = entries.len();

    let descriptors = entries
        .into_iter()
        .map(|entry| PartnerDescriptor::new(normalize_url(&entry.url)).with_status(entry.status));
    let mut list = PartnerList::new(descriptors).filter_launched(include_not_launched);
    if sort_alphabetically {
        list = list.sort_by_partner_id();
    }

    info!(
        "📋 {} partners from {} ({} rows, not launched {})",
        list.len(),
        source.describe(),
        raw_count,
        if include_not_launched { "included" } else { "excluded" }
    );
    Ok(list)
}

/// Build the source described by the configuration.
///
/// The sheet wins when set and falls back to the file or static list. There is
/// no built-in partner list: an empty configuration is an error.
pub fn source_from_config(config: &PartnersConfig) -> Result<Box<dyn PartnerSource>> {
    let local: Option<Box<dyn PartnerSource>> = match (&config.file, config.urls.is_empty()) {
        (Some(path), _) => Some(Box::new(FilePartnerSource::new(path.clone()))),
        (None, false) => Some(Box::new(StaticPartnerSource::from_urls(config.urls.clone()))),
        (None, true) => None,
    };

    match (&config.sheet_csv_url, local) {
        (Some(url), Some(local)) => Ok(Box::new(FallbackPartnerSource::new(
            Box::new(SheetCsvPartnerSource::new(url.clone())?),
            local,
        ))),
        (Some(url), None) => Ok(Box::new(SheetCsvPartnerSource::new(url.clone())?)),
        (None, Some(local)) => Ok(local),
        (None, None) => Err(anyhow!(
            "No partner source configured: set partners.urls, partners.file or partners.sheet_csv_url"
        )),
    }
}
