//! Command handlers.

pub mod blur;
pub mod config;
pub mod upload;
