//! # Skillradar Library
//!
//! The CLI modules, exposed for integration tests.
//!
//! The binary drives them through the `main.rs` entry point.

pub mod cli;
pub mod config;
pub mod report;

// Re-export skillradar_core for convenience
pub use skillradar_core;
