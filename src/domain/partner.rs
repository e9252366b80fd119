//! Partner descriptors and the ordered partner list a scan runs over

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Whether a partner page is live yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStatus {
    #[default]
    Launched,
    NotLaunched,
}

impl LaunchStatus {
    /// Parse the status column of a partner list. Unknown or empty means launched.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "not_launched" | "not launched" | "not-launched" => Self::NotLaunched,
            _ => Self::Launched,
        }
    }
}

/// One partner landing page to scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerDescriptor {
    pub url: String,
    pub display_name: String,
    #[serde(default)]
    pub launch_status: LaunchStatus,
}

impl PartnerDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let display_name = partner_id_from_url(&url);
        Self {
            url,
            display_name,
            launch_status: LaunchStatus::Launched,
        }
    }

    pub fn with_status(mut self, status: LaunchStatus) -> Self {
        self.launch_status = status;
        self
    }

    /// Stable identifier used in reports (same derivation as the display name)
    pub fn partner_id(&self) -> String {
        partner_id_from_url(&self.url)
    }
}

/// Last non-empty path segment of a partner URL.
///
/// `https://get.example.com/moon/` → `moon`. A URL without any path segment
/// yields its host; anything unparseable falls back to plain `/` splitting.
pub fn partner_id_from_url(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        let last_segment = parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
            .map(str::to_string);

        if let Some(segment) = last_segment {
            return segment;
        }
        if let Some(host) = parsed.host_str() {
            return host.to_string();
        }
    }

    url.split('/')
        .rev()
        .find(|s| !s.is_empty())
        .unwrap_or(url)
        .to_string()
}

/// Ordered, de-duplicated list of partners for one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerList {
    partners: Vec<PartnerDescriptor>,
}

impl PartnerList {
    /// Build from descriptors, keeping the first occurrence of each URL
    pub fn new(partners: impl IntoIterator<Item = PartnerDescriptor>) -> Self {
        let mut seen = HashSet::new();
        let partners = partners
            .into_iter()
            .filter(|p| seen.insert(p.url.clone()))
            .collect();
        Self { partners }
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(urls.into_iter().map(PartnerDescriptor::new))
    }

    /// Drop not-yet-launched partners unless they were asked for
    pub fn filter_launched(mut self, include_not_launched: bool) -> Self {
        if !include_not_launched {
            self.partners
                .retain(|p| p.launch_status == LaunchStatus::Launched);
        }
        self
    }

    /// Case-insensitive alphabetical order by partner id
    pub fn sort_by_partner_id(mut self) -> Self {
        self.partners
            .sort_by_cached_key(|p| p.partner_id().to_lowercase());
        self
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PartnerDescriptor> {
        self.partners.iter()
    }

    pub fn as_slice(&self) -> &[PartnerDescriptor] {
        &self.partners
    }
}

impl<'a> IntoIterator for &'a PartnerList {
    type Item = &'a PartnerDescriptor;
    type IntoIter = std::slice::Iter<'a, PartnerDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.partners.iter()
    }
}
