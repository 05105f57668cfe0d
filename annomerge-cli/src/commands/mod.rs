//! CLI command implementations

pub mod check;
pub mod config;
pub mod export;
pub mod merge;
pub mod projects;
