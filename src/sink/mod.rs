//! Record sink adapter.
//!
//! Records are written through a [`DocumentStore`]: one write transaction per
//! batch, scoped to the `ledgers` or `transactions` collection. The
//! production store is the hub HTTP API ([`HubStore`]), authorized by a
//! [`HubAuth`] capability built once at startup.

mod auth;
mod error;
mod hub;
mod store;
mod writer;

pub use auth::{ApiCredentials, ApiSignature, AuthError, Authenticator, HubAuth, Identity};
pub use error::SinkError;
pub use hub::{HubStore, HubTransaction};
pub use store::{Collection, DocumentStore, WriteTransaction};
pub use writer::RecordSink;
