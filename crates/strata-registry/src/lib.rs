//! Registry core for Strata.
//!
//! Strata serves a container registry whose only durable state is an
//! append-only ledger. Nothing here is stored; everything is derived from
//! ledger records on demand.
//!
//! # Architecture
//!
//! - **Organizations** are replayed from their `type=org` history. Only
//!   members of the current authorized set can change it.
//! - **Tags and content** resolve to the newest record written by a current
//!   member, found by paging the ledger newest first.
//! - **Writes** are signed with the context's wallet and refused unless the
//!   signer is a member.
//! - **Uploads** accumulate in scratch files and publish in the background;
//!   a short-lived cache covers the gap until the ledger reaches finality.
//!
//! # Modules
//!
//! - [`org`]: Replay fold and [`OrganizationResolver`]
//! - [`index`]: tag and content lookups ([`ContentIndex`])
//! - [`writer`]: signed submissions ([`WritePath`])
//! - [`cache`]: [`ConsistencyCache`]
//! - [`staging`]: [`UploadStaging`] and [`FinalizeHandle`]
//! - [`registry`]: The [`Registry`] facade
//! - [`names`]: Name and reference validation

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod index;
pub mod names;
pub mod org;
pub mod registry;
pub mod staging;
pub mod writer;

pub use cache::{CacheKey, ConsistencyCache, UploadStatus};
pub use config::RegistryConfig;
pub use context::RegistryContext;
pub use error::{RegistryError, RegistryResult};
pub use index::{ContentIndex, Locator};
pub use names::Reference;
pub use org::{OrgReplay, Organization, OrganizationResolver};
pub use registry::{manifest_media_type, Registry, OCI_MANIFEST};
pub use staging::{FinalizeHandle, UploadSession, UploadStaging};
pub use writer::{ContentPayload, PayloadBody, WritePath};
