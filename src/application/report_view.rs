//! Report browsing and console rendering
//!
//! Read-only views over a finished [`ScanReport`]: filtering for the browser
//! and plain-text blocks for the console.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

use crate::domain::{PagePartnerReport, Priority, ScanReport};

const ERROR_PREVIEW_CHARS: usize = 50;
const RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFilter {
    #[default]
    All,
    WithDomains,
    NeedsUpdate,
    HighPriority,
    /// Every card on the page sold
    SoldOut,
    /// Nothing sold yet
    NoSales,
}

impl ReportFilter {
    pub const ALL: [ReportFilter; 6] = [
        ReportFilter::All,
        ReportFilter::WithDomains,
        ReportFilter::NeedsUpdate,
        ReportFilter::HighPriority,
        ReportFilter::SoldOut,
        ReportFilter::NoSales,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportFilter::All => "all",
            ReportFilter::WithDomains => "with_domains",
            ReportFilter::NeedsUpdate => "needs_update",
            ReportFilter::HighPriority => "high_priority",
            ReportFilter::SoldOut => "sold_out",
            ReportFilter::NoSales => "no_sales",
        }
    }

    /// Error entries never match
    pub fn matches(self, result: &PagePartnerReport) -> bool {
        if result.is_error() {
            return false;
        }
        match self {
            ReportFilter::All => true,
            ReportFilter::WithDomains => result.has_premium_domains,
            ReportFilter::NeedsUpdate => result.needs_update(),
            ReportFilter::HighPriority => result.priority() == Priority::High,
            #[allow(clippy::float_cmp)]
            ReportFilter::SoldOut => result.percentage_sold() == 100.0,
            ReportFilter::NoSales => result.sold_domains() == 0,
        }
    }
}

impl FromStr for ReportFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|f| f.as_str()).collect();
                format!("unknown filter '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// Results passing `filter` whose partner id contains `search` (case-insensitive)
pub fn filter_results<'a>(
    report: &'a ScanReport,
    filter: ReportFilter,
    search: Option<&str>,
) -> Vec<&'a PagePartnerReport> {
    let needle = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    report
        .results
        .iter()
        .filter(|r| filter.matches(r))
        .filter(|r| {
            needle
                .as_ref()
                .is_none_or(|n| r.partner_id.to_lowercase().contains(n.as_str()))
        })
        .collect()
}

fn tier_marker(result: &PagePartnerReport) -> &'static str {
    match result.priority() {
        Priority::High => "🚨",
        Priority::Medium => "⚠️",
        Priority::Low | Priority::None => "✅",
    }
}

/// One line per partner for the live view
pub fn status_line(result: &PagePartnerReport) -> String {
    if let Some(error) = &result.error {
        let preview: String = error.chars().take(ERROR_PREVIEW_CHARS).collect();
        return format!("❌ {}: Error: {}", result.partner_id, preview);
    }
    if !result.has_premium_domains {
        return format!("➖ {}: No domains", result.partner_id);
    }
    format!(
        "{} {}: {}/{} ({:.1}%)",
        tier_marker(result),
        result.partner_id,
        result.sold_domains(),
        result.total_domains(),
        result.percentage_sold()
    )
}

/// Totals block, partners needing updates, every partner with domains, then scan errors
pub fn render_summary(report: &ScanReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "DOMAIN SALES TRACKING REPORT");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "Scan completed: {}", report.scan_timestamp.to_rfc3339());
    let _ = writeln!(out, "Scan id: {}", report.scan_id);
    let _ = writeln!(
        out,
        "Partners scanned: {}/{}",
        s.successful_scans, s.total_partners_scanned
    );
    let _ = writeln!(out, "Pages with premium domains: {}", s.pages_with_premium_domains);
    let _ = writeln!(
        out,
        "Pages without premium domains: {}",
        s.pages_without_premium_domains
    );
    let _ = writeln!(out, "Total domains: {}", s.total_domains_across_all_partners);
    let _ = writeln!(out, "Total sold: {}", s.total_sold_across_all_partners);
    let _ = writeln!(out, "Total sold value: ${}", s.total_sold_value);
    let _ = writeln!(out, "Overall sell-through rate: {}%", s.overall_sell_through_rate);
    let _ = writeln!(out, "Partners needing update: {}", s.partners_needing_update);
    let _ = writeln!(out, "High priority updates: {}", s.high_priority_updates);

    let needing = report.needing_update();
    if !needing.is_empty() {
        let _ = writeln!(out, "\n{RULE}\n🔴 PARTNERS NEEDING UPDATES:\n{RULE}");
        for result in needing {
            let _ = writeln!(
                out,
                "{} {}: {}/{} sold ({}%)",
                tier_marker(result),
                result.partner_id.to_uppercase(),
                result.sold_domains(),
                result.total_domains(),
                result.percentage_sold()
            );
        }
    }

    let _ = writeln!(out, "\n{RULE}\n📊 ALL PARTNERS WITH DOMAINS:\n{RULE}");
    for result in &report.results {
        if result.is_error() {
            let _ = writeln!(out, "❌ {} - ERROR", result.partner_id.to_uppercase());
        } else if result.has_premium_domains {
            let marker = if result.needs_update() { "🔴" } else { "✅" };
            let _ = writeln!(
                out,
                "{} {}: {}/{} sold ({}%)",
                marker,
                result.partner_id.to_uppercase(),
                result.sold_domains(),
                result.total_domains(),
                result.percentage_sold()
            );
        }
    }

    let mut errors = report.errors().peekable();
    if errors.peek().is_some() {
        let _ = writeln!(out, "\n{RULE}\n❌ SCAN ERRORS:\n{RULE}");
        for result in errors {
            let _ = writeln!(
                out,
                "{}: {}",
                result.partner_id.to_uppercase(),
                result.error.as_deref().unwrap_or_default()
            );
        }
    }
    out
}

/// Full detail for one partner, including its sold and available cards
pub fn render_partner_detail(result: &PagePartnerReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Partner: {}", result.partner_id.to_uppercase());
    let _ = writeln!(out, "URL: {}", result.url);
    let _ = writeln!(out, "Scan Time: {}\n", result.timestamp.to_rfc3339());

    if let Some(error) = &result.error {
        let _ = writeln!(out, "❌ Scan failed: {error}");
        return out;
    }
    let Some(stats) = result.stats.as_ref().filter(|_| result.has_premium_domains) else {
        let _ = writeln!(out, "❌ No premium domains found on this page");
        return out;
    };

    let _ = writeln!(out, "📊 SUMMARY:");
    let _ = writeln!(out, "Total Domains: {}", stats.total_domains);
    let _ = writeln!(
        out,
        "Sold: {} ({:.1}%)",
        stats.sold_domains, stats.percentage_sold
    );
    let _ = writeln!(out, "Available: {}", stats.available_domains);
    let _ = writeln!(out, "Total Sold Value: ${}\n", stats.total_sold_value);

    if let Some(assessment) = result.priority_classification.as_ref().filter(|a| a.needs_update) {
        let _ = writeln!(
            out,
            "🔴 UPDATE NEEDED ({})",
            assessment.priority.to_string().to_uppercase()
        );
        let _ = writeln!(out, "Reason: {}\n", assessment.reason);
    }

    if !stats.sold_domains_list.is_empty() {
        let _ = writeln!(out, "💰 SOLD DOMAINS:");
        for card in &stats.sold_domains_list {
            let _ = writeln!(out, "  • {} - {}", card.domain_name, card.price_display);
        }
        out.push('\n');
    }
    if !stats.available_domains_list.is_empty() {
        let _ = writeln!(out, "🛒 AVAILABLE DOMAINS:");
        for card in &stats.available_domains_list {
            let _ = writeln!(out, "  • {} - {}", card.domain_name, card.price_display);
        }
    }
    out
}
