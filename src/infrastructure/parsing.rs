//! HTML parsing for partner landing pages
//!
//! Card location, the card handle contract, and the card parser.

pub mod card_handle;
pub mod card_parser;
pub mod config;
pub mod error;

pub use card_handle::{CardHandle, CardLocator};
pub use card_parser::{extract_price, CardParser};
pub use config::{CardSelectors, ElementSpec};
pub use error::{ParsingError, ParsingResult};
