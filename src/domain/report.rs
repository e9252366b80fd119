//! Page reports and the cross-partner scan report
//!
//! A `PagePartnerReport` is built once per partner per scan and never mutated
//! afterwards; the only transformation is attaching the classification. A
//! `ScanReport` owns the ordered results and the summary derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::card::DomainCardRecord;
use super::priority::{PageTotals, Priority, ThresholdPolicy, UpdateAssessment};

/// `part / whole * 100` rounded half away from zero to two decimals, 0 for an empty whole
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Card totals of a page that was fetched and parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStats {
    pub total_domains: u32,
    pub sold_domains: u32,
    pub available_domains: u32,
    pub percentage_sold: f64,
    pub total_sold_value: u64,
    /// Every card in page order, whatever its status
    pub domains: Vec<DomainCardRecord>,
    #[serde(default)]
    pub sold_domains_list: Vec<DomainCardRecord>,
    #[serde(default)]
    pub available_domains_list: Vec<DomainCardRecord>,
}

/// Scan outcome for one partner page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePartnerReport {
    #[serde(rename = "partner")]
    pub partner_id: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub has_premium_domains: bool,

    /// Absent for failed scans
    #[serde(flatten)]
    pub stats: Option<PageStats>,

    #[serde(
        rename = "needs_update",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub priority_classification: Option<UpdateAssessment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PagePartnerReport {
    /// Attach the update assessment. Failed scans always get the "Scan failed" assessment.
    #[must_use]
    pub fn with_classification(mut self, policy: &ThresholdPolicy) -> Self {
        let assessment = if self.is_error() {
            UpdateAssessment::scan_failed()
        } else {
            policy.classify(&self.totals())
        };
        self.priority_classification = Some(assessment);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Fetched successfully but no cards on the page
    pub fn is_empty_page(&self) -> bool {
        !self.is_error() && !self.has_premium_domains
    }

    pub fn totals(&self) -> PageTotals {
        PageTotals {
            has_premium_domains: self.has_premium_domains,
            total_domains: self.total_domains(),
            sold_domains: self.sold_domains(),
            percentage_sold: self.percentage_sold(),
        }
    }

    pub fn total_domains(&self) -> u32 {
        self.stats.as_ref().map_or(0, |s| s.total_domains)
    }

    pub fn sold_domains(&self) -> u32 {
        self.stats.as_ref().map_or(0, |s| s.sold_domains)
    }

    pub fn available_domains(&self) -> u32 {
        self.stats.as_ref().map_or(0, |s| s.available_domains)
    }

    pub fn percentage_sold(&self) -> f64 {
        self.stats.as_ref().map_or(0.0, |s| s.percentage_sold)
    }

    pub fn total_sold_value(&self) -> u64 {
        self.stats.as_ref().map_or(0, |s| s.total_sold_value)
    }

    pub fn domains(&self) -> &[DomainCardRecord] {
        self.stats.as_ref().map_or(&[], |s| s.domains.as_slice())
    }

    pub fn needs_update(&self) -> bool {
        self.priority_classification
            .as_ref()
            .is_some_and(|a| a.needs_update)
    }

    pub fn priority(&self) -> Priority {
        self.priority_classification
            .as_ref()
            .map_or(Priority::None, |a| a.priority)
    }
}

/// Aggregate counters over every page of a scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_partners_scanned: u32,
    pub successful_scans: u32,
    pub failed_scans: u32,
    pub pages_with_premium_domains: u32,
    pub pages_without_premium_domains: u32,
    pub partners_needing_update: u32,
    pub high_priority_updates: u32,
    pub total_domains_across_all_partners: u64,
    pub total_sold_across_all_partners: u64,
    pub total_sold_value: u64,
    pub overall_sell_through_rate: f64,
}

impl ScanSummary {
    /// Failed scans are counted but never contribute to domain totals.
    pub fn from_results(results: &[PagePartnerReport]) -> Self {
        let mut summary = Self {
            total_partners_scanned: count(results.len()),
            ..Self::default()
        };

        for report in results {
            if report.is_error() {
                summary.failed_scans += 1;
                continue;
            }
            summary.successful_scans += 1;

            if !report.has_premium_domains {
                summary.pages_without_premium_domains += 1;
                continue;
            }
            summary.pages_with_premium_domains += 1;
            summary.total_domains_across_all_partners = summary
                .total_domains_across_all_partners
                .saturating_add(u64::from(report.total_domains()));
            summary.total_sold_across_all_partners = summary
                .total_sold_across_all_partners
                .saturating_add(u64::from(report.sold_domains()));
            summary.total_sold_value = summary
                .total_sold_value
                .saturating_add(report.total_sold_value());

            if report.needs_update() {
                summary.partners_needing_update += 1;
                if report.priority() == Priority::High {
                    summary.high_priority_updates += 1;
                }
            }
        }

        summary.overall_sell_through_rate = percentage(
            summary.total_sold_across_all_partners,
            summary.total_domains_across_all_partners,
        );
        summary
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Order of `ScanReport::results`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrder {
    /// Partner list order
    #[default]
    Input,
    /// Case-insensitive by partner id
    Alphabetical,
}

impl ResultOrder {
    pub fn apply(self, results: &mut [PagePartnerReport]) {
        if self == Self::Alphabetical {
            results.sort_by_cached_key(|r| r.partner_id.to_lowercase());
        }
    }
}

/// Result of one orchestrated scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: Uuid,
    pub scan_timestamp: DateTime<Utc>,
    pub summary: ScanSummary,
    pub results: Vec<PagePartnerReport>,
}

impl ScanReport {
    pub fn new(scan_id: Uuid, results: Vec<PagePartnerReport>) -> Self {
        Self {
            scan_id,
            scan_timestamp: Utc::now(),
            summary: ScanSummary::from_results(&results),
            results,
        }
    }

    /// URLs of pages that loaded fine but listed no premium domains
    pub fn pages_without_domains(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.is_empty_page())
            .map(|r| r.url.as_str())
            .collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &PagePartnerReport> {
        self.results.iter().filter(|r| r.is_error())
    }

    /// Pages needing an update, highest priority first, then by sell-through
    pub fn needing_update(&self) -> Vec<&PagePartnerReport> {
        let mut pages: Vec<_> = self
            .results
            .iter()
            .filter(|r| r.has_premium_domains && r.needs_update())
            .collect();
        pages.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| b.percentage_sold().total_cmp(&a.percentage_sold()))
        });
        pages
    }
}
