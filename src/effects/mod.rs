//! Ledger node requests as data.
//!
//! The ingestion pipeline never talks to the node directly. It builds
//! [`SourceRequest`] values and hands them to a [`LedgerSource`], which
//! executes them. This keeps the fetch strategy pure enough to test against a
//! scripted source and lets every request be logged as data.

pub mod interpreter;
pub mod source;

pub use interpreter::LedgerSource;
pub use source::SourceRequest;
