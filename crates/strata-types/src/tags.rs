//! Tag names Strata reads and writes on ledger records.
//!
//! These are part of the on-ledger data format: records written by earlier
//! deployments carry exactly these names, so they must not change.

/// Application namespace; every query filters on it.
pub const APP: &str = "app";
/// Record kind, one of [`RecordKind`](crate::RecordKind).
pub const TYPE: &str = "type";
/// Logical organization name.
pub const ORG: &str = "org";
/// Artifact (image) name within the organization.
pub const ARTIFACT: &str = "image_name";
/// Tag name of a `ref` record.
pub const TAG_NAME: &str = "tag_name";
/// Content reference (digest) of `ref` and `content` records.
pub const REFERENCE: &str = "ref";
/// JSON array of authorized addresses on an `org` record.
pub const AUTHORIZED_USERS: &str = "authorized_users";
/// Organization homepage on an `org` record.
pub const HOMEPAGE: &str = "homepage";
/// Media type of a `content` record's body.
pub const CONTENT_TYPE: &str = "Content-Type";
