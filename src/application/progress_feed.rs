//! Progress feed for live views
//! Drains the scan event channel without blocking and reduces it to a snapshot.

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::domain::{PagePartnerReport, ScanEvent};

#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    pub scan_id: Option<Uuid>,
    pub total: usize,
    pub completed: usize,
    /// Partner being fetched right now
    pub current_partner: Option<String>,
    pub finished: bool,
    pub cancelled: bool,
    pub failure: Option<String>,
    /// Per-partner results in arrival order
    pub results: Vec<PagePartnerReport>,
}

impl ProgressSnapshot {
    pub fn apply(&mut self, ev: &ScanEvent) {
        match ev {
            ScanEvent::Started { scan_id, total } => {
                *self = Self {
                    scan_id: Some(*scan_id),
                    total: *total,
                    ..Self::default()
                };
            }
            ScanEvent::PartnerStarted { partner_id, .. } => {
                self.current_partner = Some(partner_id.clone());
            }
            ScanEvent::PartnerFinished(report) => {
                self.results.push((**report).clone());
            }
            ScanEvent::Progress { completed, total } => {
                self.completed = *completed;
                self.total = *total;
                self.current_partner = None;
            }
            ScanEvent::Completed(report) => {
                self.completed = report.results.len();
                self.finished = true;
                self.current_partner = None;
            }
            ScanEvent::Cancelled { completed, total } => {
                self.completed = *completed;
                self.total = *total;
                self.finished = true;
                self.cancelled = true;
                self.current_partner = None;
            }
            ScanEvent::Failed { message } => {
                self.failure = Some(message.clone());
                self.finished = true;
                self.current_partner = None;
            }
        }
    }

    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

pub struct ProgressFeed {
    events: UnboundedReceiver<ScanEvent>,
    snapshot: ProgressSnapshot,
    disconnected: bool,
}

impl ProgressFeed {
    pub fn new(events: UnboundedReceiver<ScanEvent>) -> Self {
        Self {
            events,
            snapshot: ProgressSnapshot::default(),
            disconnected: false,
        }
    }

    /// Apply everything pending and return what was applied. Never blocks.
    pub fn poll(&mut self) -> Vec<ScanEvent> {
        let mut applied = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(ev) => {
                    self.snapshot.apply(&ev);
                    applied.push(ev);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        applied
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    /// Sender gone and everything drained
    pub fn is_closed(&self) -> bool {
        self.disconnected
    }
}
