//! Reference scoring components

mod distance;

pub use distance::TopicDistanceScorer;
