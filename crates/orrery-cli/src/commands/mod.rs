//! CLI command implementations.

pub mod account;
pub mod backends;
pub mod common;
pub mod jobs;
pub mod submit;
