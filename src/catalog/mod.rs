//! Plugin capability catalog
//!
//! Records, per component, its category, accepted input types, cost and
//! speed ratings and whether it configured successfully. The orchestrator
//! selects from here.

mod entry;
mod error;
mod registry;

pub use entry::{
    normalize_input_type, CatalogEntry, ComponentCategory, Selection, MAX_RATING, MIN_RATING,
};
pub use error::{CatalogError, CatalogResult};
pub use registry::Catalog;
