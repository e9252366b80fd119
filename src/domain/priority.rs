//! Update-priority classification for partner pages
//!
//! A page that is close to selling out needs fresh inventory. The tiers are
//! decided purely from the page aggregate; the cut-offs come from a
//! [`ThresholdPolicy`] chosen once per scan.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// How urgently a partner page listing should be refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(label)
    }
}

/// Classification result attached to every page report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAssessment {
    pub needs_update: bool,
    pub priority: Priority,
    pub reason: String,
}

impl UpdateAssessment {
    fn new(needs_update: bool, priority: Priority, reason: impl Into<String>) -> Self {
        Self {
            needs_update,
            priority,
            reason: reason.into(),
        }
    }

    /// Assessment for a partner whose scan failed
    pub fn scan_failed() -> Self {
        Self::new(false, Priority::None, "Scan failed")
    }
}

/// The aggregate fields the classifier looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTotals {
    pub has_premium_domains: bool,
    pub total_domains: u32,
    pub sold_domains: u32,
    pub percentage_sold: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("thresholds must satisfy 0 <= medium ({medium}) <= high ({high}) <= 100")]
    OutOfOrder { medium: f64, high: f64 },
}

/// Percentage cut-offs for the `high` and `medium` tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub high_pct: f64,
    pub medium_pct: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            high_pct: 90.0,
            medium_pct: 75.0,
        }
    }
}

impl ThresholdPolicy {
    pub fn new(high_pct: f64, medium_pct: f64) -> Result<Self, ThresholdError> {
        let policy = Self {
            high_pct,
            medium_pct,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// The 50% medium cut-off used by the headless and live scanners
    pub fn legacy_half() -> Self {
        Self {
            high_pct: 90.0,
            medium_pct: 50.0,
        }
    }

    pub fn validate(&self) -> Result<(), ThresholdError> {
        let ordered = (0.0..=100.0).contains(&self.medium_pct)
            && (0.0..=100.0).contains(&self.high_pct)
            && self.medium_pct <= self.high_pct;
        if ordered {
            Ok(())
        } else {
            Err(ThresholdError::OutOfOrder {
                medium: self.medium_pct,
                high: self.high_pct,
            })
        }
    }

    /// First matching rule wins.
    pub fn classify(&self, totals: &PageTotals) -> UpdateAssessment {
        let PageTotals {
            has_premium_domains,
            total_domains: total,
            sold_domains: sold,
            percentage_sold,
        } = *totals;

        if !has_premium_domains {
            return UpdateAssessment::new(false, Priority::None, "No premium domains on this page");
        }
        if percentage_sold >= self.high_pct {
            return UpdateAssessment::new(
                true,
                Priority::High,
                format!("Almost sold out ({sold}/{total} sold)"),
            );
        }
        if percentage_sold >= self.medium_pct {
            return UpdateAssessment::new(
                true,
                Priority::Medium,
                format!("Mostly sold ({sold}/{total} sold)"),
            );
        }
        // Only reachable with a page flagged as premium but holding zero cards.
        if sold == total {
            return UpdateAssessment::new(true, Priority::High, "Completely sold out");
        }
        UpdateAssessment::new(false, Priority::Low, "")
    }
}

/// Classify page totals under the given policy
pub fn classify(totals: &PageTotals, policy: &ThresholdPolicy) -> UpdateAssessment {
    policy.classify(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn totals(total: u32, sold: u32) -> PageTotals {
        let percentage_sold = if total == 0 {
            0.0
        } else {
            (f64::from(sold) / f64::from(total) * 100.0 * 100.0).round() / 100.0
        };
        PageTotals {
            has_premium_domains: total > 0,
            total_domains: total,
            sold_domains: sold,
            percentage_sold,
        }
    }

    #[rstest]
    #[case(10, 9, Priority::High, true, "Almost sold out (9/10 sold)")]
    #[case(10, 10, Priority::High, true, "Almost sold out (10/10 sold)")]
    #[case(10, 8, Priority::Medium, true, "Mostly sold (8/10 sold)")]
    #[case(4, 3, Priority::Medium, true, "Mostly sold (3/4 sold)")]
    #[case(10, 5, Priority::Low, false, "")]
    #[case(0, 0, Priority::None, false, "No premium domains on this page")]
    fn test_default_policy(
        #[case] total: u32,
        #[case] sold: u32,
        #[case] priority: Priority,
        #[case] needs_update: bool,
        #[case] reason: &str,
    ) {
        let assessment = ThresholdPolicy::default().classify(&totals(total, sold));
        assert_eq!(assessment.priority, priority);
        assert_eq!(assessment.needs_update, needs_update);
        assert_eq!(assessment.reason, reason);
    }

    #[test]
    fn test_legacy_half_policy_promotes_half_sold_pages() {
        let assessment = ThresholdPolicy::legacy_half().classify(&totals(10, 5));
        assert_eq!(assessment.priority, Priority::Medium);
        assert!(assessment.needs_update);
    }

    #[test]
    fn test_flagged_page_without_cards_is_completely_sold_out() {
        let flagged = PageTotals {
            has_premium_domains: true,
            total_domains: 0,
            sold_domains: 0,
            percentage_sold: 0.0,
        };
        let assessment = ThresholdPolicy::default().classify(&flagged);
        assert_eq!(assessment.priority, Priority::High);
        assert_eq!(assessment.reason, "Completely sold out");
    }

    #[test]
    fn test_policy_validation() {
        assert!(ThresholdPolicy::new(90.0, 75.0).is_ok());
        assert!(ThresholdPolicy::new(50.0, 75.0).is_err());
        assert!(ThresholdPolicy::new(120.0, 75.0).is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Low > Priority::None);
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
    }
}
