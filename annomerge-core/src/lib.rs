//! Domain model for merging annotation projects: tasks, field rewriting,
//! fingerprint deduplication, and labeling-schema compatibility.

pub mod error;
pub mod ids;
pub mod merge;
pub mod rewrite;
pub mod schema;
pub mod task;

pub use error::*;
pub use ids::*;
pub use merge::*;
pub use rewrite::*;
pub use schema::*;
pub use task::*;
