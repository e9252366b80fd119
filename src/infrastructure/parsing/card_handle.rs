//! Card fragment handles and the locator that finds them
//!
//! The parser only needs a handful of queries on a card fragment. They are
//! collected in [`CardHandle`] so the extraction rules do not depend on the
//! HTML library.

use scraper::{ElementRef, Html, Selector};

use super::config::ElementSpec;
use super::error::{ParsingError, ParsingResult};

/// Queries the card parser runs against one product card
pub trait CardHandle: Sized {
    /// First descendant with the given tag and class
    fn find(&self, tag: &str, class: &str) -> Option<Self>;

    /// Concatenated text content, trimmed
    fn trimmed_text(&self) -> String;

    fn attribute(&self, name: &str) -> Option<&str>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn class_list(&self) -> Vec<&str>;

    fn find_spec(&self, spec: &ElementSpec) -> Option<Self> {
        self.find(&spec.tag, &spec.class)
    }
}

impl CardHandle for ElementRef<'_> {
    fn find(&self, tag: &str, class: &str) -> Option<Self> {
        self.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == tag && el.value().classes().any(|c| c == class))
    }

    fn trimmed_text(&self) -> String {
        self.text().collect::<String>().trim().to_string()
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn class_list(&self) -> Vec<&str> {
        self.value().classes().collect()
    }
}

/// Finds card fragments in a parsed page, in document order
#[derive(Debug, Clone)]
pub struct CardLocator {
    marker: Selector,
}

impl CardLocator {
    pub fn new(marker: &ElementSpec) -> ParsingResult<Self> {
        let css = marker.css();
        let selector =
            Selector::parse(&css).map_err(|e| ParsingError::invalid_selector(&css, e))?;
        Ok(Self { marker: selector })
    }

    pub fn locate<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        document.select(&self.marker).collect()
    }
}
