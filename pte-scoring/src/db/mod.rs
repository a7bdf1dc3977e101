//! Database access for pte-scoring
//!
//! Pool creation and schema live in `pte_common::db`; this module holds the
//! queries the service runs against those tables.

pub mod attempts;
pub mod credits;
pub mod progress;

pub use pte_common::db::{init_database, init_memory_database};
