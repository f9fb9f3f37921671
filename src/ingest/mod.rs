//! Sequential ledger ingestion.
//!
//! # Module Structure
//!
//! - [`state`]: run phase, cursor and progress counters
//! - [`controller`]: the per-ledger loop and shutdown handling

mod controller;
mod error;
mod state;


pub use controller::{IngestController, RunSummary, StopReason};
pub use error::IngestError;
pub use state::{RunPhase, RunState};
