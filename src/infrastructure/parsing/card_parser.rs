//! Premium domain card parser
//!
//! Turns one card fragment into a [`DomainCardRecord`]. Missing pieces are
//! normal (empty name, no price, no button) and never fail the card, so even
//! an empty fragment comes back as an `available` record with empty fields.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::card_handle::{CardHandle, CardLocator};
use super::config::CardSelectors;
use super::error::ParsingResult;
use crate::domain::{CardStatus, DomainCardRecord};

static PRICE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$(\d+)").expect("price pattern is a valid regex"));

/// Stateless card parser with pre-compiled selectors
#[derive(Debug, Clone)]
pub struct CardParser {
    locator: CardLocator,
    selectors: CardSelectors,
}

impl CardParser {
    pub fn new(selectors: CardSelectors) -> ParsingResult<Self> {
        selectors.validate()?;
        let locator = CardLocator::new(&selectors.card)?;
        Ok(Self { locator, selectors })
    }

    /// Parse every card on a page, in page order
    pub fn parse_page(&self, html: &str) -> Vec<DomainCardRecord> {
        let document = Html::parse_document(html);
        let cards = self.locator.locate(&document);
        debug!("Found {} domain cards", cards.len());

        cards.iter().map(|card| self.parse_card(card)).collect()
    }

    /// Always returns a record; absent parts leave their fields empty.
    pub fn parse_card<H: CardHandle>(&self, card: &H) -> DomainCardRecord {
        let domain_name = self.domain_name(card);
        let button = card.find_spec(&self.selectors.button);
        let button_text = button
            .as_ref()
            .map(CardHandle::trimmed_text)
            .unwrap_or_default();
        let status = match &button {
            Some(button) => self.status_from_button(button, &button_text),
            None => CardStatus::Available,
        };

        let price_numeric = card
            .find_spec(&self.selectors.price)
            .and_then(|price| extract_price(&price.trimmed_text()));
        let price_display = price_numeric.map(|n| format!("${n}")).unwrap_or_default();

        DomainCardRecord {
            domain_name,
            status,
            price_display,
            price_numeric: price_numeric.unwrap_or(0),
            button_text,
            error: None,
        }
    }

    fn domain_name<H: CardHandle>(&self, card: &H) -> String {
        let slug = card.find_spec(&self.selectors.slug);
        let ending = card.find_spec(&self.selectors.ending);
        match (slug, ending) {
            (Some(slug), Some(ending)) => {
                format!("{}{}", slug.trimmed_text(), ending.trimmed_text())
            }
            _ => String::new(),
        }
    }

    /// Label rules first, class/attribute heuristic last.
    fn status_from_button<H: CardHandle>(&self, button: &H, button_text: &str) -> CardStatus {
        let label = button_text.to_lowercase();
        match label.as_str() {
            "sold" => CardStatus::Sold,
            "coming soon" => CardStatus::ComingSoon,
            "buy now" => CardStatus::Available,
            _ if label.starts_with("available") => {
                // Template quirk: "Available <date>" labels are not purchasable yet.
                debug!("Treating button label '{}' as coming soon", button_text);
                CardStatus::ComingSoon
            }
            _ => {
                let marked_sold = button
                    .class_list()
                    .iter()
                    .any(|class| *class == self.selectors.sold_class);
                if marked_sold && button.has_attribute("disabled") {
                    CardStatus::Sold
                } else {
                    CardStatus::Available
                }
            }
        }
    }
}

/// First integer following a `$`; `None` when absent or too large
pub fn extract_price(text: &str) -> Option<u64> {
    PRICE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
}
