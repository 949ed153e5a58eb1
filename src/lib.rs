//! Yearly Codex CLI usage summaries built from session logs

pub mod cli;
pub mod config;
pub mod parsers;
pub mod services;
pub mod types;
