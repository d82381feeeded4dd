//! Catalog rows and the selection filter applied to them

use super::error::{CatalogError, CatalogResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Lowest (cheapest / fastest) rating
pub const MIN_RATING: u32 = 1;
/// Highest (most expensive / slowest) rating
pub const MAX_RATING: u32 = 10;

/// What a component can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentCategory {
    Enrichment,
    StorageInterface,
    Scoring,
}

impl ComponentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentCategory::Enrichment => "enrichment",
            ComponentCategory::StorageInterface => "storage-interface",
            ComponentCategory::Scoring => "scoring",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub category: ComponentCategory,
    pub configured: bool,
    pub description: String,
    /// 1 cheapest, 10 most expensive
    pub cost: u32,
    /// 1 fastest, 10 slowest
    pub speed: u32,
    /// Accepted input types; only meaningful for enrichments
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub input_types: BTreeSet<String>,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, category: ComponentCategory, cost: u32, speed: u32) -> Self {
        Self {
            name: name.into(),
            category,
            configured: true,
            description: String::new(),
            cost,
            speed,
            input_types: BTreeSet::new(),
        }
    }

    /// Row for a component whose configuration failed.
    ///
    /// Ratings are pinned to the maximum; it is never selected by default.
    pub fn unconfigured(name: impl Into<String>, category: ComponentCategory) -> Self {
        Self {
            configured: false,
            ..Self::new(name, category, MAX_RATING, MAX_RATING)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_configured(mut self, configured: bool) -> Self {
        self.configured = configured;
        self
    }

    /// Add accepted input types, normalized to trimmed lowercase
    pub fn with_input_types<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.input_types
            .extend(inputs.into_iter().filter_map(|s| normalize_input_type(s.as_ref())));
        self
    }

    /// Pin out-of-range ratings to [`MAX_RATING`] and mark the row unconfigured.
    ///
    /// Returns `true` if a rating was rewritten.
    pub(crate) fn clamp_ratings(&mut self) -> bool {
        let mut clamped = false;
        for rating in [&mut self.cost, &mut self.speed] {
            if !(MIN_RATING..=MAX_RATING).contains(rating) {
                *rating = MAX_RATING;
                clamped = true;
            }
        }
        if clamped {
            self.configured = false;
        }
        clamped
    }

    pub(crate) fn validate(&self) -> CatalogResult<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        for (field, value) in [("cost", self.cost), ("speed", self.speed)] {
            if !(MIN_RATING..=MAX_RATING).contains(&value) {
                return Err(CatalogError::RatingOutOfRange {
                    name: self.name.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Trim and lowercase an input type; blank input yields `None`.
pub fn normalize_input_type(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Filter applied when selecting components
///
/// Defaults: cost and speed ceilings of 10, configured components only,
/// no name restriction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub max_cost: u32,
    pub max_speed: u32,
    pub require_configured: bool,
    /// Restrict to these names
    pub names: Option<BTreeSet<String>>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            max_cost: MAX_RATING,
            max_speed: MAX_RATING,
            require_configured: true,
            names: None,
        }
    }
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_cost(mut self, max_cost: u32) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn max_speed(mut self, max_speed: u32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Select components whose `configured` flag equals `configured`
    pub fn require_configured(mut self, configured: bool) -> Self {
        self.require_configured = configured;
        self
    }

    /// Intersect the result with these names
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn matches(&self, entry: &CatalogEntry) -> bool {
        if entry.cost > self.max_cost || entry.speed > self.max_speed {
            return false;
        }
        if entry.configured != self.require_configured {
            return false;
        }
        match &self.names {
            Some(names) => names.contains(&entry.name),
            None => true,
        }
    }
}
