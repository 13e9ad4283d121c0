//! CLI command implementations

pub mod check;
pub mod completions;
pub mod config;
pub mod dot;
pub mod get;
pub mod list;
pub mod relations;
pub mod types;
