//! Events emitted by a running scan
//!
//! A scan reports on a one-way channel. For every partner the order is
//! `PartnerStarted` → `PartnerFinished` → `Progress`, and every scan ends with
//! exactly one terminal event (`Completed`, `Cancelled` or `Failed`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::report::{PagePartnerReport, ScanReport};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ScanEvent {
    /// Scan accepted, `total` partners queued
    Started { scan_id: Uuid, total: usize },
    /// About to fetch the partner at `index` (0-based)
    PartnerStarted { index: usize, partner_id: String },
    /// Finished report for one partner, success or error
    PartnerFinished(Box<PagePartnerReport>),
    Progress { completed: usize, total: usize },
    Completed(Box<ScanReport>),
    /// Stop requested; the partial report is returned to the caller
    Cancelled { completed: usize, total: usize },
    Failed { message: String },
}

impl ScanEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Cancelled { .. } | Self::Failed { .. }
        )
    }
}
