//! Name validation for organizations, artifacts, tags, and references.
//!
//! Organization and artifact names:
//! - Must be non-empty
//! - Only lowercase ASCII letters, digits, and the separators `.`, `_`, `-`
//! - Must not start or end with a separator
//! - Must not contain two separators in a row
//!
//! Tag names:
//! - 1 to 128 characters
//! - ASCII letters, digits, `_`, `.`, `-`
//! - Must not start with `.` or `-`

use std::fmt;

use strata_types::Digest;

use crate::error::{RegistryError, RegistryResult};

const MAX_TAG_LEN: usize = 128;

fn is_separator(ch: char) -> bool {
    matches!(ch, '.' | '_' | '-')
}

fn invalid(name: &str, reason: impl Into<String>) -> RegistryError {
    RegistryError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn validate_component(kind: &str, name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(invalid(name, format!("{kind} name must not be empty")));
    }

    if let Some(ch) = name
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || is_separator(*ch)))
    {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }

    if name.starts_with(is_separator) || name.ends_with(is_separator) {
        return Err(invalid(name, "must not start or end with a separator"));
    }

    let mut previous_separator = false;
    for ch in name.chars() {
        let separator = is_separator(ch);
        if separator && previous_separator {
            return Err(invalid(name, "must not contain consecutive separators"));
        }
        previous_separator = separator;
    }

    Ok(())
}

/// Validate an organization name.
///
/// ```
/// use strata_registry::names::validate_org_name;
///
/// assert!(validate_org_name("acme").is_ok());
/// assert!(validate_org_name("Acme").is_err());
/// ```
pub fn validate_org_name(name: &str) -> RegistryResult<()> {
    validate_component("organization", name)
}

/// Validate an artifact (image) name. Same rules as organization names.
pub fn validate_artifact_name(name: &str) -> RegistryResult<()> {
    validate_component("artifact", name)
}

/// Validate a tag name.
pub fn validate_tag_name(name: &str) -> RegistryResult<()> {
    if name.is_empty() {
        return Err(invalid(name, "tag name must not be empty"));
    }
    if name.len() > MAX_TAG_LEN {
        return Err(invalid(name, format!("longer than {MAX_TAG_LEN} characters")));
    }
    if name.starts_with(['.', '-']) {
        return Err(invalid(name, "must not start with '.' or '-'"));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')))
    {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

/// Parse a `sha256:<hex>` digest.
pub fn parse_digest(value: &str) -> RegistryResult<Digest> {
    Digest::parse(value).map_err(|e| RegistryError::InvalidDigest(e.to_string()))
}

/// The reference segment of a manifest path: either a tag or a digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reference {
    Tag(String),
    Digest(Digest),
}

impl Reference {
    /// Anything containing `:` is treated as a digest; everything else must
    /// be a valid tag.
    pub fn parse(value: &str) -> RegistryResult<Self> {
        if Digest::is_digest_like(value) {
            parse_digest(value).map(Self::Digest)
        } else {
            validate_tag_name(value)?;
            Ok(Self::Tag(value.to_string()))
        }
    }

    pub fn as_digest(&self) -> Option<&Digest> {
        match self {
            Self::Digest(digest) => Some(digest),
            Self::Tag(_) => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.write_str(tag),
            Self::Digest(digest) => write!(f, "{digest}"),
        }
    }
}
