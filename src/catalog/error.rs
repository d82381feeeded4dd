use super::entry::ComponentCategory;
use thiserror::Error;

/// Catalog registration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("component '{name}' is already registered as {existing}, cannot register it as {attempted}")]
    DuplicateCategoryConflict {
        name: String,
        existing: ComponentCategory,
        attempted: ComponentCategory,
    },

    #[error("component '{name}' has {field} {value}, expected 1-10")]
    RatingOutOfRange {
        name: String,
        field: &'static str,
        value: u32,
    },

    #[error("component name must not be empty")]
    EmptyName,
}

pub type CatalogResult<T> = Result<T, CatalogError>;
