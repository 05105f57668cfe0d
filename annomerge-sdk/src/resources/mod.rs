//! SDK resource modules
//!
//! Resource-specific clients for the annotation server's REST endpoints.

pub mod exports;
pub mod projects;
pub mod tasks;

pub use exports::ExportsClient;
pub use projects::ProjectsClient;
pub use tasks::TasksClient;
