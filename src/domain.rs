//! Domain module - scan value types and classification rules
//!
//! Everything here is pure: no I/O, no async, no shared state.

pub mod card;
pub mod events;
pub mod partner;
pub mod priority;
pub mod report;

pub use card::{CardStatus, DomainCardRecord};
pub use events::ScanEvent;
pub use partner::{partner_id_from_url, LaunchStatus, PartnerDescriptor, PartnerList};
pub use priority::{classify, PageTotals, Priority, ThresholdError, ThresholdPolicy, UpdateAssessment};
pub use report::{percentage, PagePartnerReport, PageStats, ResultOrder, ScanReport, ScanSummary};
