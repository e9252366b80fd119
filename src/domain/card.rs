//! Product card records extracted from partner landing pages
//!
//! One `DomainCardRecord` is produced per card per scan. Records are plain
//! values: they are never mutated after extraction and only survive as part
//! of the page report that owns them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sale state of a single premium domain card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Sold,
    Available,
    ComingSoon,
    Error,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sold => "sold",
            Self::Available => "available",
            Self::ComingSoon => "coming_soon",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted state of one product card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCardRecord {
    /// Slug text + ending text (e.g. `moon` + `.com`), empty when either part is missing
    #[serde(rename = "domain")]
    pub domain_name: String,

    pub status: CardStatus,

    /// `"$<integer>"` or empty
    #[serde(rename = "price")]
    pub price_display: String,

    pub price_numeric: u64,

    /// Raw trimmed button label, empty when the card has no button
    #[serde(default)]
    pub button_text: String,

    /// Diagnostic attached to `CardStatus::Error` records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainCardRecord {
    pub fn is_sold(&self) -> bool {
        self.status == CardStatus::Sold
    }

    pub fn is_available(&self) -> bool {
        self.status == CardStatus::Available
    }
}
