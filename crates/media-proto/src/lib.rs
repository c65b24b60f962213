//! Shared types for the media catalog client: wire records, configuration,
//! user preferences and display formatting.

pub mod config;
pub mod format;
pub mod model;
pub mod platform;
pub mod settings;
