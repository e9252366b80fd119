//! Scan orchestration
//!
//! Visits partners strictly one at a time: fetch, parse, aggregate, classify.
//! A failing partner becomes an error entry and the scan moves on. Progress
//! goes out on a one-way channel and a cancellation token is checked once per
//! partner; an in-flight fetch is never interrupted.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::aggregator::PageAggregator;
use crate::domain::{
    PagePartnerReport, PartnerDescriptor, PartnerList, ResultOrder, ScanEvent, ScanReport,
    ThresholdPolicy,
};
use crate::infrastructure::config::ScanConfig;
use crate::infrastructure::page_fetcher::{FetchError, PageFetcher};
use crate::infrastructure::parsing::{CardParser, ParsingError};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No partners to scan")]
    NoPartners,

    #[error("Invalid scan settings: {0}")]
    InvalidSettings(String),

    #[error("Card parser setup failed: {0}")]
    Parser(#[from] ParsingError),

    #[error("Page fetcher setup failed: {0}")]
    Fetcher(#[from] FetchError),

    #[error("Scan worker failed: {0}")]
    Worker(String),
}

/// Pacing, classification and ordering of one scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub request_delay: Duration,
    pub request_jitter: Duration,
    pub threshold_policy: ThresholdPolicy,
    pub result_order: ResultOrder,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl ScanSettings {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            request_delay: config.request_delay(),
            request_jitter: config.request_jitter(),
            threshold_policy: config.threshold_policy(),
            result_order: config.result_order,
        }
    }

    /// Pause before the next partner: delay plus random jitter
    fn next_pause(&self) -> Duration {
        let jitter_ms = u64::try_from(self.request_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            self.request_delay
        } else {
            self.request_delay
                .saturating_add(Duration::from_millis(fastrand::u64(0..=jitter_ms)))
        }
    }
}

pub struct ScanOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    parser: CardParser,
    partners: PartnerList,
    settings: ScanSettings,
}

impl ScanOrchestrator {
    /// Setup problems are reported here, before any partner is touched.
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        parser: CardParser,
        partners: PartnerList,
        settings: ScanSettings,
    ) -> Result<Self, ScanError> {
        if partners.is_empty() {
            return Err(ScanError::NoPartners);
        }
        settings
            .threshold_policy
            .validate()
            .map_err(|e| ScanError::InvalidSettings(e.to_string()))?;

        Ok(Self {
            fetcher,
            parser,
            partners,
            settings,
        })
    }

    pub fn partners(&self) -> &PartnerList {
        &self.partners
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scan everything without events or cancellation
    pub async fn run(&self) -> ScanReport {
        let (events, _) = mpsc::unbounded_channel();
        self.run_with_events(events, CancellationToken::new()).await
    }

    /// Scan, reporting on `events`. A closed receiver does not stop the scan.
    pub async fn run_with_events(
        &self,
        events: UnboundedSender<ScanEvent>,
        cancel: CancellationToken,
    ) -> ScanReport {
        let scan_id = Uuid::new_v4();
        let total = self.partners.len();
        let emit = |event: ScanEvent| {
            if events.send(event).is_err() {
                debug!("Event receiver dropped");
            }
        };

        info!("🚀 Scan {} started: {} partners", scan_id, total);
        emit(ScanEvent::Started { scan_id, total });

        let mut results: Vec<PagePartnerReport> = Vec::with_capacity(total);
        let mut cancelled = false;

        for (index, partner) in self.partners.iter().enumerate() {
            if index > 0 {
                let pause = self.settings.next_pause();
                tokio::select! {
                    () = tokio::time::sleep(pause) => {}
                    () = cancel.cancelled() => {}
                }
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            info!("🔍 [{}/{}] Scanning {}", index + 1, total, partner.display_name);
            emit(ScanEvent::PartnerStarted {
                index,
                partner_id: partner.partner_id(),
            });

            let report = self.scan_partner(partner).await;
            emit(ScanEvent::PartnerFinished(Box::new(report.clone())));
            results.push(report);
            emit(ScanEvent::Progress {
                completed: results.len(),
                total,
            });
        }

        let completed = results.len();
        self.settings.result_order.apply(&mut results);
        let report = ScanReport::new(scan_id, results);

        if cancelled {
            warn!("🛑 Scan {} cancelled after {}/{} partners", scan_id, completed, total);
            emit(ScanEvent::Cancelled { completed, total });
        } else {
            info!(
                "✅ Scan {} finished: {} ok, {} failed, {} need updates",
                scan_id,
                report.summary.successful_scans,
                report.summary.failed_scans,
                report.summary.partners_needing_update
            );
            emit(ScanEvent::Completed(Box::new(report.clone())));
        }
        report
    }

    async fn scan_partner(&self, partner: &PartnerDescriptor) -> PagePartnerReport {
        let fetched = self.fetcher.fetch(&partner.url).await.and_then(|page| {
            if page.html.trim().is_empty() {
                Err(FetchError::EmptyBody { url: page.url })
            } else {
                Ok(page)
            }
        });
        let report = match fetched {
            Ok(page) => {
                if !page.marker_found {
                    debug!("No card marker on {}", partner.url);
                }
                let records = self.parser.parse_page(&page.html);
                let report = PageAggregator::aggregate(partner, records, Utc::now());
                if report.has_premium_domains {
                    info!(
                        "   Result: {}/{} sold ({:.1}%)",
                        report.sold_domains(),
                        report.total_domains(),
                        report.percentage_sold()
                    );
                } else {
                    info!("   No premium domains on {}", partner.display_name);
                }
                report
            }
            Err(e) => {
                warn!("❌ {} failed: {}", partner.display_name, e);
                PageAggregator::fetch_failed(partner, e.to_string(), Utc::now())
            }
        };
        report.with_classification(&self.settings.threshold_policy)
    }

    /// Run on a background task
    pub fn spawn(self) -> ScanHandle {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let failure_tx = tx.clone();

        let join = tokio::spawn(async move {
            let worker =
                tokio::spawn(async move { self.run_with_events(tx, worker_cancel).await });
            match worker.await {
                Ok(report) => Ok(report),
                Err(e) => {
                    error!("Scan worker crashed: {}", e);
                    let _ = failure_tx.send(ScanEvent::Failed {
                        message: e.to_string(),
                    });
                    Err(ScanError::Worker(e.to_string()))
                }
            }
        });

        ScanHandle {
            events,
            control: ScanControl { cancel, join },
        }
    }
}

/// Stop/wait side of a spawned scan
pub struct ScanControl {
    cancel: CancellationToken,
    join: JoinHandle<Result<ScanReport, ScanError>>,
}

impl ScanControl {
    /// Request cooperative cancellation
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn wait(self) -> Result<ScanReport, ScanError> {
        self.join
            .await
            .map_err(|e| ScanError::Worker(e.to_string()))?
    }
}

/// A running scan: its event stream plus control
pub struct ScanHandle {
    events: UnboundedReceiver<ScanEvent>,
    control: ScanControl,
}

impl ScanHandle {
    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn events(&mut self) -> &mut UnboundedReceiver<ScanEvent> {
        &mut self.events
    }

    pub fn into_parts(self) -> (UnboundedReceiver<ScanEvent>, ScanControl) {
        (self.events, self.control)
    }

    /// Wait for the report, discarding any unread events
    pub async fn wait(self) -> Result<ScanReport, ScanError> {
        self.control.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use crate::infrastructure::page_fetcher::FetchedPage;
    use crate::infrastructure::parsing::CardSelectors;
    use async_trait::async_trait;
    use std::collections::HashMap;

    fn card(name: &str, label: &str) -> String {
        format!(
            r#"<div class="domain-card"><div class="domain-slug">{name}</div><strong class="domain-ending">.com</strong><div class="price">$100</div><button class="add-to-cart">{label}</button></div>"#
        )
    }

    fn page(sold: usize, available: usize) -> String {
        let mut html = String::from("<html><body>");
        for i in 0..sold {
            html.push_str(&card(&format!("s{i}"), "Sold"));
        }
        for i in 0..available {
            html.push_str(&card(&format!("a{i}"), "Buy Now"));
        }
        html.push_str("</body></html>");
        html
    }

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, Result<String, FetchError>>,
        cancel_on: Option<(String, CancellationToken)>,
    }

    impl FakeFetcher {
        fn with_page(mut self, url: &str, html: String) -> Self {
            self.pages.insert(url.to_string(), Ok(html));
            self
        }

        fn with_failure(mut self, url: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Err(FetchError::HttpStatus {
                    status: 503,
                    url: url.to_string(),
                }),
            );
            self
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            if let Some((trigger, token)) = &self.cancel_on {
                if trigger == url {
                    token.cancel();
                }
            }
            match self.pages.get(url) {
                Some(Ok(html)) => Ok(FetchedPage {
                    url: url.to_string(),
                    html: html.clone(),
                    status: 200,
                    marker_found: html.contains("domain-card"),
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Err(FetchError::Network {
                    url: url.to_string(),
                    message: "unknown host".to_string(),
                }),
            }
        }
    }

    fn fast_settings() -> ScanSettings {
        ScanSettings {
            request_delay: Duration::ZERO,
            request_jitter: Duration::ZERO,
            ..ScanSettings::default()
        }
    }

    fn orchestrator(fetcher: FakeFetcher, urls: &[&str], settings: ScanSettings) -> ScanOrchestrator {
        ScanOrchestrator::new(
            Arc::new(fetcher),
            CardParser::new(CardSelectors::default()).unwrap(),
            PartnerList::from_urls(urls.iter().copied()),
            settings,
        )
        .unwrap()
    }

    const A: &str = "https://x.test/alpha/";
    const B: &str = "https://x.test/beta/";
    const C: &str = "https://x.test/gamma/";

    #[tokio::test]
    async fn test_run_classifies_each_partner() {
        let fetcher = FakeFetcher::default()
            .with_page(A, page(9, 1))
            .with_page(B, page(8, 2))
            .with_page(C, page(0, 0));
        let report = orchestrator(fetcher, &[A, B, C], fast_settings()).run().await;

        let priorities: Vec<_> = report.results.iter().map(PagePartnerReport::priority).collect();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::None]);
        assert_eq!(report.summary.partners_needing_update, 2);
        assert_eq!(report.summary.high_priority_updates, 1);
        assert_eq!(report.summary.total_sold_value, 1700);
    }

    #[tokio::test]
    async fn test_blank_page_is_an_error_not_an_empty_page() {
        let fetcher = FakeFetcher::default()
            .with_page(A, String::new())
            .with_page(B, "   \n".to_string())
            .with_page(C, page(0, 0));
        let report = orchestrator(fetcher, &[A, B, C], fast_settings()).run().await;

        assert!(report.results[0].is_error());
        assert!(report.results[0].error.as_deref().unwrap().contains("Failed to retrieve page content"));
        assert!(report.results[1].is_error());
        assert_eq!(report.summary.failed_scans, 2);
        assert_eq!(report.summary.pages_without_premium_domains, 1);
        assert_eq!(report.pages_without_domains(), vec![C]);
    }

    #[tokio::test]
    async fn test_failed_partner_does_not_abort_scan() {
        let fetcher = FakeFetcher::default()
            .with_page(A, page(1, 1))
            .with_failure(B)
            .with_page(C, page(2, 0));
        let report = orchestrator(fetcher, &[A, B, C], fast_settings()).run().await;

        assert_eq!(report.results.len(), 3);
        assert!(report.results[1].is_error());
        assert_eq!(report.summary.successful_scans, 2);
        assert_eq!(report.summary.failed_scans, 1);
    }

    #[tokio::test]
    async fn test_alphabetical_result_order() {
        let fetcher = FakeFetcher::default()
            .with_page(C, page(0, 1))
            .with_page(A, page(0, 1));
        let settings = ScanSettings {
            result_order: ResultOrder::Alphabetical,
            ..fast_settings()
        };
        let report = orchestrator(fetcher, &[C, A], settings).run().await;
        let ids: Vec<_> = report.results.iter().map(|r| r.partner_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "gamma"]);
    }

    #[tokio::test]
    async fn test_cancel_is_checked_between_partners() {
        let token = CancellationToken::new();
        let fetcher = FakeFetcher {
            cancel_on: Some((B.to_string(), token.clone())),
            ..FakeFetcher::default()
        }
        .with_page(A, page(1, 0))
        .with_page(B, page(1, 0))
        .with_page(C, page(1, 0));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let report = orchestrator(fetcher, &[A, B, C], fast_settings())
            .run_with_events(tx, token)
            .await;

        // the in-flight fetch for B completes, C is never started
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.summary.total_partners_scanned, 2);

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(
            last,
            Some(ScanEvent::Cancelled { completed: 2, total: 3 })
        ));
    }

    #[tokio::test]
    async fn test_spawned_scan_can_be_stopped_during_delay() {
        let fetcher = FakeFetcher::default()
            .with_page(A, page(1, 0))
            .with_page(B, page(1, 0));
        let settings = ScanSettings {
            request_delay: Duration::from_secs(60),
            ..fast_settings()
        };
        let mut handle = orchestrator(fetcher, &[A, B], settings).spawn();

        // wait until the first partner is done, then stop during the long pause
        while let Some(event) = handle.events().recv().await {
            if matches!(event, ScanEvent::Progress { completed: 1, .. }) {
                break;
            }
        }
        handle.stop();

        let report = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("cancellation interrupts the delay")
            .unwrap();
        assert_eq!(report.results.len(), 1);
    }

    #[test]
    fn test_setup_errors() {
        let parser = CardParser::new(CardSelectors::default()).unwrap();
        let empty = ScanOrchestrator::new(
            Arc::new(FakeFetcher::default()),
            parser.clone(),
            PartnerList::default(),
            ScanSettings::default(),
        );
        assert!(matches!(empty, Err(ScanError::NoPartners)));

        let inverted = ScanSettings {
            threshold_policy: ThresholdPolicy {
                high_pct: 50.0,
                medium_pct: 75.0,
            },
            ..ScanSettings::default()
        };
        let invalid = ScanOrchestrator::new(
            Arc::new(FakeFetcher::default()),
            parser,
            PartnerList::from_urls([A]),
            inverted,
        );
        assert!(matches!(invalid, Err(ScanError::InvalidSettings(_))));
    }

    #[test]
    fn test_pause_stays_within_jitter() {
        let settings = ScanSettings {
            request_delay: Duration::from_millis(100),
            request_jitter: Duration::from_millis(50),
            ..ScanSettings::default()
        };
        for _ in 0..50 {
            let pause = settings.next_pause();
            assert!(pause >= Duration::from_millis(100) && pause <= Duration::from_millis(150));
        }
    }
}
