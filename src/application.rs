//! Application layer
//!
//! Pipeline stages and the scan loop built on top of the domain types.

pub mod aggregator;
pub mod progress_feed;
pub mod report_view;
pub mod scan_orchestrator;

pub use aggregator::PageAggregator;
pub use progress_feed::{ProgressFeed, ProgressSnapshot};
pub use report_view::{filter_results, render_partner_detail, render_summary, status_line, ReportFilter};
pub use scan_orchestrator::{ScanControl, ScanError, ScanHandle, ScanOrchestrator, ScanSettings};
