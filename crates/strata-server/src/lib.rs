//! HTTP front end for the Strata registry.
//!
//! Speaks the container registry API (`/v2/...`) on top of
//! [`strata_registry::Registry`]. Manifest and blob reads redirect to the
//! gateway URL of the ledger record holding the body; uploads are staged
//! locally and published in the background.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::StrataServer;
pub use state::AppState;
