//! # PTE Common Library
//!
//! Shared code for the PTE practice scoring services including:
//! - Error type used by every crate in the workspace
//! - Bootstrap configuration loading
//! - Shared domain models (speaking subtypes, score results, skills)
//! - Event types and the in-process EventBus
//! - Calendar/time helpers
//! - SQLite pool initialisation

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod time;

pub use error::{Error, Result};
