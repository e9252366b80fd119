//! End-to-end scan pipeline: fetch → parse → aggregate → classify → summary
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use domain_sales_tracker_lib::application::{ScanOrchestrator, ScanSettings};
use domain_sales_tracker_lib::domain::{
    CardStatus, PartnerList, Priority, ResultOrder, ScanEvent, ThresholdPolicy,
};
use domain_sales_tracker_lib::infrastructure::{
    CardParser, CardSelectors, FetchError, FetchedPage, FetcherConfig, HttpPageFetcher,
    PageFetcher,
};

fn card(slug: &str, button: &str, price: &str) -> String {
    format!(
        r#"<div class="domain-card">
             <div class="domain-slug">{slug}</div><strong class="domain-ending">.com</strong>
             <div class="price">{price}</div>
             {button}
           </div>"#
    )
}

fn sold(slug: &str, price: u64) -> String {
    card(
        slug,
        r#"<button class="add-to-cart sold" disabled>Sold</button>"#,
        &format!("${price}"),
    )
}

fn available(slug: &str, price: u64) -> String {
    card(
        slug,
        r#"<button class="add-to-cart">Buy Now</button>"#,
        &format!("${price}"),
    )
}

fn page(cards: &[String]) -> String {
    format!("<html><body><section>{}</section></body></html>", cards.concat())
}

/// Serves canned pages and records the order URLs were requested in
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, Result<String, FetchError>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), Ok(html));
        self
    }

    fn failure(mut self, url: &str, error: FetchError) -> Self {
        self.pages.insert(url.to_string(), Err(error));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Ok(html)) => Ok(FetchedPage {
                url: url.to_string(),
                html: html.clone(),
                status: 200,
                marker_found: true,
            }),
            Some(Err(e)) => Err(e.clone()),
            None => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }
}

fn settings() -> ScanSettings {
    ScanSettings {
        request_delay: Duration::ZERO,
        request_jitter: Duration::ZERO,
        threshold_policy: ThresholdPolicy::default(),
        result_order: ResultOrder::Input,
    }
}

fn parser() -> CardParser {
    CardParser::new(CardSelectors::default()).unwrap()
}

const P1: &str = "https://partners.test/orbit/";
const P2: &str = "https://partners.test/nova/";
const P3: &str = "https://partners.test/comet/";

fn three_partner_fetcher() -> ScriptedFetcher {
    let p1: Vec<String> = (0..9)
        .map(|i| sold(&format!("orbit{i}"), 100))
        .chain([available("orbitfree", 250)])
        .collect();
    ScriptedFetcher::default()
        .page(P1, page(&p1))
        .failure(
            P2,
            FetchError::HttpStatus {
                status: 502,
                url: P2.to_string(),
            },
        )
        .page(P3, page(&[]))
}

#[tokio::test]
async fn partial_failure_keeps_scanning_and_summarizes() {
    let fetcher = Arc::new(three_partner_fetcher());
    let orchestrator = ScanOrchestrator::new(
        fetcher.clone(),
        parser(),
        PartnerList::from_urls([P1, P2, P3]),
        settings(),
    )
    .unwrap();

    let report = orchestrator.run().await;
    assert_eq!(fetcher.requested(), vec![P1, P2, P3]);
    assert_eq!(report.results.len(), 3);

    let orbit = &report.results[0];
    assert_eq!(orbit.partner_id, "orbit");
    assert_eq!(orbit.total_domains(), 10);
    assert_eq!(orbit.sold_domains(), 9);
    assert_eq!(orbit.percentage_sold(), 90.0);
    assert_eq!(orbit.total_sold_value(), 900);
    assert_eq!(orbit.priority(), Priority::High);
    assert_eq!(orbit.domains()[9].status, CardStatus::Available);
    assert_eq!(orbit.domains()[9].domain_name, "orbitfree.com");

    let nova = &report.results[1];
    assert!(nova.is_error());
    assert!(nova.error.as_deref().unwrap().contains("502"));
    assert!(!nova.needs_update());

    let comet = &report.results[2];
    assert!(!comet.has_premium_domains);
    assert_eq!(comet.priority(), Priority::None);

    let s = &report.summary;
    assert_eq!(s.total_partners_scanned, 3);
    assert_eq!(s.successful_scans, 2);
    assert_eq!(s.failed_scans, 1);
    assert_eq!(s.pages_with_premium_domains, 1);
    assert_eq!(s.pages_without_premium_domains, 1);
    assert_eq!(s.partners_needing_update, 1);
    assert_eq!(s.high_priority_updates, 1);
    assert_eq!(s.total_domains_across_all_partners, 10);
    assert_eq!(s.total_sold_across_all_partners, 9);
    assert_eq!(s.total_sold_value, 900);
    assert_eq!(s.overall_sell_through_rate, 90.0);

    assert_eq!(report.pages_without_domains(), vec![P3]);
}

#[tokio::test]
async fn events_follow_status_result_progress_order() {
    let orchestrator = ScanOrchestrator::new(
        Arc::new(three_partner_fetcher()),
        parser(),
        PartnerList::from_urls([P1, P2, P3]),
        settings(),
    )
    .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = orchestrator
        .run_with_events(tx, CancellationToken::new())
        .await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    // Started + 3 × (PartnerStarted, PartnerFinished, Progress) + Completed
    assert_eq!(events.len(), 11);
    assert!(matches!(events[0], ScanEvent::Started { total: 3, .. }));
    for (i, chunk) in events[1..10].chunks(3).enumerate() {
        assert!(matches!(&chunk[0], ScanEvent::PartnerStarted { index, .. } if *index == i));
        assert!(matches!(&chunk[1], ScanEvent::PartnerFinished(_)));
        assert!(
            matches!(&chunk[2], ScanEvent::Progress { completed, total: 3 } if *completed == i + 1)
        );
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    match &events[10] {
        ScanEvent::Completed(done) => assert_eq!(done.scan_id, report.scan_id),
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[tokio::test]
async fn alphabetical_order_sorts_results_not_fetches() {
    let fetcher = Arc::new(three_partner_fetcher());
    let orchestrator = ScanOrchestrator::new(
        fetcher.clone(),
        parser(),
        PartnerList::from_urls([P1, P2, P3]),
        ScanSettings {
            result_order: ResultOrder::Alphabetical,
            ..settings()
        },
    )
    .unwrap();

    let report = orchestrator.run().await;
    let ids: Vec<_> = report.results.iter().map(|r| r.partner_id.as_str()).collect();
    assert_eq!(ids, vec!["comet", "nova", "orbit"]);
    assert_eq!(fetcher.requested(), vec![P1, P2, P3]);
}

#[tokio::test]
async fn cancelled_before_start_returns_empty_report() {
    let fetcher = Arc::new(three_partner_fetcher());
    let orchestrator = ScanOrchestrator::new(
        fetcher.clone(),
        parser(),
        PartnerList::from_urls([P1, P2, P3]),
        settings(),
    )
    .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let report = orchestrator.run_with_events(tx, cancel).await;

    assert!(report.results.is_empty());
    assert_eq!(report.summary.total_partners_scanned, 0);
    assert!(fetcher.requested().is_empty());

    assert!(matches!(rx.try_recv(), Ok(ScanEvent::Started { .. })));
    assert!(matches!(
        rx.try_recv(),
        Ok(ScanEvent::Cancelled {
            completed: 0,
            total: 3
        })
    ));
}

#[tokio::test]
async fn dropped_receiver_does_not_abort_scan() {
    let orchestrator = ScanOrchestrator::new(
        Arc::new(three_partner_fetcher()),
        parser(),
        PartnerList::from_urls([P1, P2, P3]),
        settings(),
    )
    .unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    let report = orchestrator
        .run_with_events(tx, CancellationToken::new())
        .await;
    assert_eq!(report.results.len(), 3);
}

#[tokio::test]
async fn http_fetcher_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/alpha/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(&[
            sold("a1", 500),
            sold("a2", 300),
            available("a3", 200),
            available("a4", 200),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/beta/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpPageFetcher::new(FetcherConfig {
        max_requests_per_second: 100,
        max_retries: 0,
        retry_base_delay_ms: 1,
        ..FetcherConfig::default()
    })
    .unwrap();

    let alpha = format!("{}/alpha/", server.uri());
    let beta = format!("{}/beta/", server.uri());
    let orchestrator = ScanOrchestrator::new(
        Arc::new(fetcher),
        parser(),
        PartnerList::from_urls([alpha.clone(), beta.clone()]),
        settings(),
    )
    .unwrap();

    let report = orchestrator.run().await;
    assert_eq!(report.results[0].partner_id, "alpha");
    assert_eq!(report.results[0].sold_domains(), 2);
    assert_eq!(report.results[0].total_sold_value(), 800);
    assert_eq!(report.results[0].priority(), Priority::Low);
    assert!(report.results[1].is_error());
    assert_eq!(report.summary.failed_scans, 1);
}
