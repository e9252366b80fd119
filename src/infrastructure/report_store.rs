//! Scan report persistence
//!
//! Reports are written as pretty JSON. Pages that loaded but listed no premium
//! domains also go to a plain-text review list so they can be dropped from
//! future partner lists.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::ScanReport;

const NO_DOMAINS_HEADER: &str = "# Pages without premium domains - review and remove from scan list\n\
# Copy this list to remove these URLs from your partner_urls list\n\n";

/// Paths written by [`ReportStore::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReport {
    pub report_path: PathBuf,
    pub no_domains_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
    write_no_domains_list: bool,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_no_domains_list: true,
        }
    }

    #[must_use]
    pub fn with_no_domains_list(mut self, enabled: bool) -> Self {
        self.write_no_domains_list = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `report`. `file_name` overrides `domain_scan_results_<ts>.json`.
    pub async fn save(&self, report: &ScanReport, file_name: Option<&str>) -> Result<SavedReport> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output directory {:?}", self.dir))?;

        let timestamp = report
            .scan_timestamp
            .with_timezone(&Local)
            .format("%Y%m%d_%H%M%S")
            .to_string();

        let report_path = match file_name {
            Some(name) => self.dir.join(name),
            None => self.dir.join(format!("domain_scan_results_{timestamp}.json")),
        };
        let json = serde_json::to_string_pretty(report).context("Failed to serialize scan report")?;
        fs::write(&report_path, json)
            .await
            .with_context(|| format!("Failed to write report {report_path:?}"))?;
        info!("📄 Main results saved to: {}", report_path.display());

        let empty_pages = report.pages_without_domains();
        let no_domains_path = if self.write_no_domains_list && !empty_pages.is_empty() {
            let path = self.dir.join(format!("pages_without_domains_{timestamp}.txt"));
            let mut content = String::from(NO_DOMAINS_HEADER);
            for url in &empty_pages {
                content.push_str(url);
                content.push('\n');
            }
            fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write review list {path:?}"))?;
            info!(
                "📋 {} pages without domains saved to: {}",
                empty_pages.len(),
                path.display()
            );
            Some(path)
        } else {
            None
        };

        Ok(SavedReport {
            report_path,
            no_domains_path,
        })
    }

    pub async fn load(path: &Path) -> Result<ScanReport> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read report {path:?}"))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid scan report {path:?}"))
    }
}
