//! Command line entry point
//!
//! ```bash
//! domain-sales-tracker init-config
//! domain-sales-tracker scan --partners-file partners.txt
//! domain-sales-tracker live --sort alphabetical
//! domain-sales-tracker browse scan-results/domain_scan_results_20250101_120000.json --filter needs_update
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use domain_sales_tracker_lib::application::{
    filter_results, render_partner_detail, render_summary, status_line, ProgressFeed,
    ReportFilter, ScanOrchestrator, ScanSettings,
};
use domain_sales_tracker_lib::domain::{ResultOrder, ScanEvent, ScanReport};
use domain_sales_tracker_lib::infrastructure::{
    init_logging, init_logging_with_config, load_partner_list, source_from_config, AppConfig,
    CardParser, ConfigManager, HttpPageFetcher, ReportStore,
};

#[derive(Parser)]
#[command(name = "domain-sales-tracker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (TOML or JSON). Defaults to the per-user config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan all partners, save the report and print a summary
    Scan(ScanArgs),

    /// Scan with live per-partner progress; Ctrl-C stops after the current partner
    Live(ScanArgs),

    /// Browse a saved report
    Browse {
        report: PathBuf,

        /// all, with_domains, needs_update, high_priority, sold_out, no_sales
        #[arg(long, default_value = "all")]
        filter: ReportFilter,

        /// Case-insensitive partner name search
        #[arg(long)]
        search: Option<String>,

        /// Print full details for every match
        #[arg(long)]
        details: bool,
    },

    /// Write the default config file
    InitConfig {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Clone, Default)]
struct ScanArgs {
    /// Also scan partners marked not_launched
    #[arg(long)]
    include_not_launched: bool,

    /// Partner list file, one `URL[,status]` per line
    #[arg(long)]
    partners_file: Option<PathBuf>,

    /// Published spreadsheet CSV export URL
    #[arg(long)]
    sheet_csv_url: Option<String>,

    /// Output directory for reports
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum)]
    sort: Option<SortOrder>,

    /// Medium priority cut-off in percent (75 by default, 50 for the legacy rule)
    #[arg(long)]
    medium_threshold: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortOrder {
    Input,
    Alphabetical,
}

impl ScanArgs {
    fn apply_to(&self, config: &mut AppConfig) -> Result<()> {
        if self.include_not_launched {
            config.partners.include_not_launched = true;
        }
        if let Some(path) = &self.partners_file {
            config.partners.file = Some(path.clone());
        }
        if let Some(url) = &self.sheet_csv_url {
            config.partners.sheet_csv_url = Some(url.clone());
        }
        if let Some(dir) = &self.output {
            config.output.directory = dir.clone();
        }
        match self.sort {
            Some(SortOrder::Alphabetical) => {
                config.partners.sort_alphabetically = true;
                config.scan.result_order = ResultOrder::Alphabetical;
            }
            Some(SortOrder::Input) => {
                config.partners.sort_alphabetically = false;
                config.scan.result_order = ResultOrder::Input;
            }
            None => {}
        }
        if let Some(pct) = self.medium_threshold {
            config.scan.medium_threshold_pct = pct;
        }
        config.validate().context("Invalid scan options")?;
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(Some(path))
            .with_context(|| format!("Failed to load configuration from {path:?}")),
        None => ConfigManager::new()?.load_config(),
    }
}

async fn build_orchestrator(config: &AppConfig) -> Result<ScanOrchestrator> {
    let source = source_from_config(&config.partners)?;
    let partners = load_partner_list(
        source.as_ref(),
        config.partners.include_not_launched,
        config.partners.sort_alphabetically,
    )
    .await
    .context("Failed to load partner list")?;

    let fetcher =
        HttpPageFetcher::new(config.fetcher.clone()).context("Failed to create page fetcher")?;
    let parser = CardParser::new(config.selectors.clone()).context("Invalid card selectors")?;

    let orchestrator = ScanOrchestrator::new(
        Arc::new(fetcher),
        parser,
        partners,
        ScanSettings::from_config(&config.scan),
    )?;
    Ok(orchestrator)
}

async fn save_and_print(config: &AppConfig, report: &ScanReport) -> Result<()> {
    let store = ReportStore::new(&config.output.directory)
        .with_no_domains_list(config.output.write_no_domains_list);
    store.save(report, None).await?;
    println!("{}", render_summary(report));
    Ok(())
}

async fn run_scan(config: AppConfig) -> Result<()> {
    let orchestrator = build_orchestrator(&config).await?;
    info!("🚀 Starting Domain Sales Tracker: {} partner pages", orchestrator.partners().len());

    let report = orchestrator.run().await;
    save_and_print(&config, &report).await?;
    info!("✅ Scan completed!");
    Ok(())
}

async fn run_live(config: AppConfig) -> Result<()> {
    let orchestrator = build_orchestrator(&config).await?;
    let (events, control) = orchestrator.spawn().into_parts();
    let mut feed = ProgressFeed::new(events);
    let mut ticker = tokio::time::interval(config.scan.progress_tick());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stop_requested = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            signal = &mut ctrl_c, if !stop_requested => {
                signal.context("Failed to listen for Ctrl-C")?;
                warn!("🛑 Stop requested, finishing current partner");
                control.stop();
                stop_requested = true;
            }
        }

        for event in feed.poll() {
            match &event {
                ScanEvent::Started { total, .. } => println!("Scanning {total} partners"),
                ScanEvent::PartnerStarted { index, partner_id } => {
                    println!("[{}/{}] {partner_id}...", index + 1, feed.snapshot().total);
                }
                ScanEvent::PartnerFinished(result) => println!("    {}", status_line(result)),
                ScanEvent::Cancelled { completed, total } => {
                    println!("🛑 Stopped after {completed}/{total} partners");
                }
                ScanEvent::Failed { message } => error!("Scan failed: {}", message),
                ScanEvent::Progress { .. } | ScanEvent::Completed(_) => {}
            }
        }

        if feed.snapshot().finished || feed.is_closed() {
            break;
        }
    }

    let report = control.wait().await?;
    save_and_print(&config, &report).await
}

async fn run_browse(
    path: &Path,
    filter: ReportFilter,
    search: Option<&str>,
    details: bool,
) -> Result<()> {
    let report = ReportStore::load(path).await?;
    let matches = filter_results(&report, filter, search);

    println!(
        "{} of {} partners match '{}'",
        matches.len(),
        report.results.len(),
        filter.as_str()
    );
    for result in matches {
        if details {
            println!("{}", render_partner_detail(result));
        } else {
            println!("{}", status_line(result));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig { force } => {
            init_logging()?;
            let manager = match cli.config {
                Some(path) => ConfigManager::with_path(path),
                None => ConfigManager::new()?,
            };
            manager.write_default(force).await?;
            println!("Default configuration written to {}", manager.config_path().display());
            Ok(())
        }
        Commands::Browse {
            report,
            filter,
            search,
            details,
        } => {
            let config = load_config(cli.config.as_deref())?;
            init_logging_with_config(&config.logging)?;
            run_browse(&report, filter, search.as_deref(), details).await
        }
        Commands::Scan(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            args.apply_to(&mut config)?;
            init_logging_with_config(&config.logging)?;
            run_scan(config).await
        }
        Commands::Live(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            args.apply_to(&mut config)?;
            init_logging_with_config(&config.logging)?;
            run_live(config).await
        }
    }
}
