//! In-memory capability catalog with name, category and input-type indexes

use super::entry::{normalize_input_type, CatalogEntry, ComponentCategory, Selection};
use super::error::{CatalogError, CatalogResult};
use std::collections::{BTreeMap, BTreeSet};

/// Registry of every discovered component and what it can do
///
/// `name` is unique across all categories. Selections return sorted name
/// sets, so callers iterate them in a deterministic order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_name: BTreeMap<String, CatalogEntry>,
    by_category: BTreeMap<ComponentCategory, BTreeSet<String>>,
    /// input type -> enrichment names
    by_input: BTreeMap<String, BTreeSet<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a row.
    ///
    /// Re-registering a name under the same category replaces its row. A
    /// name already registered under another category is rejected and the
    /// existing row is left untouched.
    pub fn register(&mut self, entry: CatalogEntry) -> CatalogResult<()> {
        entry.validate()?;

        if let Some(existing) = self.by_name.get(&entry.name) {
            if existing.category != entry.category {
                return Err(CatalogError::DuplicateCategoryConflict {
                    name: entry.name.clone(),
                    existing: existing.category,
                    attempted: entry.category,
                });
            }
        }
        self.unindex(&entry.name);

        self.by_category
            .entry(entry.category)
            .or_default()
            .insert(entry.name.clone());
        if entry.category == ComponentCategory::Enrichment {
            for input in &entry.input_types {
                self.by_input
                    .entry(input.clone())
                    .or_default()
                    .insert(entry.name.clone());
            }
        }
        self.by_name.insert(entry.name.clone(), entry);
        Ok(())
    }

    fn unindex(&mut self, name: &str) {
        let Some(old) = self.by_name.remove(name) else {
            return;
        };
        if let Some(names) = self.by_category.get_mut(&old.category) {
            names.remove(name);
        }
        for input in &old.input_types {
            if let Some(names) = self.by_input.get_mut(input) {
                names.remove(name);
                if names.is_empty() {
                    self.by_input.remove(input);
                }
            }
        }
    }

    /// Every distinct input type declared by any enrichment
    pub fn list_input_types(&self) -> BTreeSet<String> {
        self.by_input.keys().cloned().collect()
    }

    /// Enrichments accepting at least one of `input_types` that pass `selection`
    pub fn select_enrichments<I, S>(&self, input_types: I, selection: &Selection) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates = BTreeSet::new();
        for input in input_types {
            let Some(input) = normalize_input_type(input.as_ref()) else {
                continue;
            };
            if let Some(names) = self.by_input.get(&input) {
                candidates.extend(names.iter().cloned());
            }
        }
        candidates
            .into_iter()
            .filter(|name| self.by_name.get(name).is_some_and(|e| selection.matches(e)))
            .collect()
    }

    /// Scoring components passing `selection`
    pub fn select_scoring(&self, selection: &Selection) -> BTreeSet<String> {
        self.names_in(ComponentCategory::Scoring)
            .filter(|name| self.by_name.get(*name).is_some_and(|e| selection.matches(e)))
            .cloned()
            .collect()
    }

    /// Storage interfaces, optionally filtered on configuration status
    pub fn list_storage(&self, require_configured: Option<bool>) -> BTreeSet<String> {
        self.names_in(ComponentCategory::StorageInterface)
            .filter(|name| match require_configured {
                Some(flag) => self.by_name.get(*name).is_some_and(|e| e.configured == flag),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn names_in(&self, category: ComponentCategory) -> impl Iterator<Item = &String> {
        self.by_category.get(&category).into_iter().flatten()
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.by_name.get(name)
    }

    /// Whether `name` is a configured component of `category`
    pub fn is_configured_as(&self, name: &str, category: ComponentCategory) -> bool {
        self.by_name
            .get(name)
            .is_some_and(|e| e.category == category && e.configured)
    }

    /// All rows sorted by name, configured or not
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
