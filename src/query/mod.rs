//! Bounded-traversal queries
//!
//! [`QueryEngine`] forwards topic queries to the active storage interface
//! and scoring requests to the active scorer. [`BoundedTraversal`] is the
//! shared BFS that in-memory backends use to answer queries.

mod engine;
mod traverse;

pub use engine::QueryEngine;
pub use traverse::BoundedTraversal;
