//! Core types and trait definitions for the Quip joke engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod delivery;
pub mod error;
pub mod joke;
pub mod preference;
pub mod search;
pub mod store;

pub use error::{Error, Result};
