//! Infrastructure layer: HTML parsing, page fetching, partner sources,
//! report persistence, configuration and logging

pub mod config;
pub mod logging;
pub mod page_fetcher;
pub mod parsing;
pub mod partner_source;
pub mod report_store;

pub use config::{AppConfig, ConfigError, ConfigManager, LoggingConfig};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use page_fetcher::{FetchError, FetchedPage, FetcherConfig, HttpPageFetcher, PageFetcher};
pub use parsing::{CardHandle, CardLocator, CardParser, CardSelectors, ParsingError, ParsingResult};
pub use partner_source::{
    load_partner_list, source_from_config, FallbackPartnerSource, FilePartnerSource,
    PartnerEntry, PartnerSource, SheetCsvPartnerSource, StaticPartnerSource,
};
pub use report_store::{ReportStore, SavedReport};
