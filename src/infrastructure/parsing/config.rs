//! Selector configuration for partner landing pages
//!
//! Every element of the card template is addressed by tag + class, which is
//! what the card handle contract supports.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{ParsingError, ParsingResult};

/// One element of the card template, e.g. `div.domain-slug`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    pub class: String,
}

impl ElementSpec {
    pub fn new(tag: &str, class: &str) -> Self {
        Self {
            tag: tag.to_string(),
            class: class.to_string(),
        }
    }

    /// CSS form used to compile a `scraper::Selector`
    pub fn css(&self) -> String {
        self.to_string()
    }

    fn validate(&self, field: &str) -> ParsingResult<()> {
        let valid_ident = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        if valid_ident(&self.tag) && valid_ident(&self.class) {
            Ok(())
        } else {
            Err(ParsingError::invalid_selector(
                &self.css(),
                format!("{field} needs a plain tag and class name"),
            ))
        }
    }
}

impl fmt::Display for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tag, self.class)
    }
}

/// CSS selectors for premium domain cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardSelectors {
    /// Marker every product card carries
    pub card: ElementSpec,
    pub slug: ElementSpec,
    pub ending: ElementSpec,
    pub button: ElementSpec,
    pub price: ElementSpec,

    /// Class that, together with `disabled`, marks a sold button
    pub sold_class: String,
}

impl Default for CardSelectors {
    fn default() -> Self {
        Self {
            card: ElementSpec::new("div", "domain-card"),
            slug: ElementSpec::new("div", "domain-slug"),
            ending: ElementSpec::new("strong", "domain-ending"),
            button: ElementSpec::new("button", "add-to-cart"),
            price: ElementSpec::new("div", "price"),
            sold_class: "sold".to_string(),
        }
    }
}

impl CardSelectors {
    pub fn validate(&self) -> ParsingResult<()> {
        self.card.validate("card")?;
        self.slug.validate("slug")?;
        self.ending.validate("ending")?;
        self.button.validate("button")?;
        self.price.validate("price")?;
        if self.sold_class.trim().is_empty() {
            return Err(ParsingError::invalid_selector(
                &self.sold_class,
                "sold marker class must not be empty",
            ));
        }
        Ok(())
    }
}
