//! Page aggregation
//!
//! Folds the card records of one page into a [`PagePartnerReport`]. The
//! report comes out unclassified; `with_classification` is a separate step.

use chrono::{DateTime, Utc};

use crate::domain::{
    percentage, CardStatus, DomainCardRecord, PagePartnerReport, PageStats, PartnerDescriptor,
};

pub struct PageAggregator;

impl PageAggregator {
    /// Totals for a page that was fetched. Cards that are neither sold nor
    /// available still count toward `total_domains` and `available_domains`.
    pub fn aggregate(
        partner: &PartnerDescriptor,
        records: Vec<DomainCardRecord>,
        timestamp: DateTime<Utc>,
    ) -> PagePartnerReport {
        let total = records.len() as u64;
        let sold = records.iter().filter(|r| r.is_sold()).count() as u64;
        let total_sold_value = records
            .iter()
            .filter(|r| r.is_sold() && r.price_numeric > 0)
            .fold(0u64, |acc, r| acc.saturating_add(r.price_numeric));

        let sold_domains_list = records
            .iter()
            .filter(|r| r.status == CardStatus::Sold)
            .cloned()
            .collect();
        let available_domains_list = records
            .iter()
            .filter(|r| r.status == CardStatus::Available)
            .cloned()
            .collect();

        let total_domains = saturating_u32(total);
        let sold_domains = saturating_u32(sold);

        PagePartnerReport {
            partner_id: partner.partner_id(),
            url: partner.url.clone(),
            timestamp,
            has_premium_domains: total > 0,
            stats: Some(PageStats {
                total_domains,
                sold_domains,
                available_domains: total_domains - sold_domains,
                percentage_sold: percentage(sold, total),
                total_sold_value,
                domains: records,
                sold_domains_list,
                available_domains_list,
            }),
            priority_classification: None,
            error: None,
        }
    }

    /// Report for a partner whose page could not be retrieved
    pub fn fetch_failed(
        partner: &PartnerDescriptor,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> PagePartnerReport {
        PagePartnerReport {
            partner_id: partner.partner_id(),
            url: partner.url.clone(),
            timestamp,
            has_premium_domains: false,
            stats: None,
            priority_classification: None,
            error: Some(message.into()),
        }
    }
}

fn saturating_u32(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
