//! Organization state reconstructed by replaying ledger history.
//!
//! An organization is never stored. Its authorized-writer set and homepage
//! are the fold of every `type=org` record for its name, oldest first:
//!
//! - The first record's owner is the founder and is always authorized after
//!   that record, whatever the record declares.
//! - A record from an owner outside the current authorized set is skipped.
//! - An accepted record replaces the whole set (snapshot, not delta) and
//!   updates the homepage if it carries one.
//!
//! [`OrgReplay`] is the pure fold; [`OrganizationResolver`] feeds it from the
//! ledger.

use strata_ledger::SortOrder;
use strata_types::{tags, Address, LedgerRecord, RecordKind};

use crate::context::RegistryContext;
use crate::error::RegistryResult;
use crate::names::validate_org_name;

/// Derived state of one organization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Organization {
    pub name: String,
    /// Authorized writers in declared order. After creation the founder is
    /// the first entry until a later snapshot says otherwise.
    pub authorized_users: Vec<Address>,
    pub homepage: String,
    pub exists: bool,
}

impl Organization {
    /// An organization with no history.
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_authorized(&self, identity: &Address) -> bool {
        self.authorized_users.contains(identity)
    }
}

/// Incremental replay of organization records in ledger order.
#[derive(Clone, Debug)]
pub struct OrgReplay {
    org: Organization,
    applied: usize,
    skipped: usize,
}

impl OrgReplay {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            org: Organization::absent(name),
            applied: 0,
            skipped: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> &Organization {
        &self.org
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Fold one record into the state. Returns whether it took effect.
    ///
    /// Records must arrive in ascending ledger order.
    pub fn apply(&mut self, record: &LedgerRecord) -> bool {
        let in_scope = record.kind() == Some(RecordKind::Org)
            && record.tag(tags::ORG) == Some(self.org.name.as_str());
        if !in_scope {
            self.skipped += 1;
            return false;
        }

        let founding = !self.org.exists;
        if founding {
            self.org.exists = true;
            self.org.authorized_users = vec![record.owner.clone()];
        }

        if !self.org.is_authorized(&record.owner) {
            tracing::debug!(
                org = %self.org.name,
                owner = %record.owner,
                id = %record.id,
                "skipping organization record from non-member",
            );
            self.skipped += 1;
            return false;
        }

        let mut declared = match declared_users(record) {
            Ok(users) => users,
            Err(reason) => {
                tracing::warn!(
                    org = %self.org.name,
                    id = %record.id,
                    %reason,
                    "skipping organization record with malformed authorized users",
                );
                self.skipped += 1;
                return false;
            }
        };
        if founding && !declared.contains(&record.owner) {
            declared.insert(0, record.owner.clone());
        }

        self.org.authorized_users = declared;
        if let Some(homepage) = record.tag(tags::HOMEPAGE) {
            self.org.homepage = homepage.to_string();
        }
        self.applied += 1;
        true
    }

    pub fn finish(self) -> Organization {
        self.org
    }
}

/// Replay a complete, ascending sequence of records.
pub fn replay<'a>(
    name: impl Into<String>,
    records: impl IntoIterator<Item = &'a LedgerRecord>,
) -> Organization {
    let mut replay = OrgReplay::new(name);
    for record in records {
        replay.apply(record);
    }
    replay.finish()
}

/// Parse the `authorized_users` tag: a JSON array of addresses. Duplicates
/// are dropped, keeping the first occurrence.
fn declared_users(record: &LedgerRecord) -> Result<Vec<Address>, String> {
    let raw = record
        .tag(tags::AUTHORIZED_USERS)
        .ok_or_else(|| "missing authorized_users tag".to_string())?;
    let values: Vec<String> = serde_json::from_str(raw).map_err(|e| e.to_string())?;

    let mut users: Vec<Address> = Vec::with_capacity(values.len());
    for value in values {
        let address = Address::new(value).map_err(|e| e.to_string())?;
        if !users.contains(&address) {
            users.push(address);
        }
    }
    Ok(users)
}

/// Resolves organizations by replaying their full ledger history.
///
/// Holds no state between calls: every resolution re-reads the ledger.
#[derive(Clone, Debug)]
pub struct OrganizationResolver {
    ctx: RegistryContext,
}

impl OrganizationResolver {
    pub fn new(ctx: RegistryContext) -> Self {
        Self { ctx }
    }

    /// Replay every `type=org` record for `name`, oldest first.
    ///
    /// A ledger failure is returned as an error, never as a nonexistent
    /// organization.
    #[tracing::instrument(skip(self), fields(org = %name))]
    pub async fn resolve(&self, name: &str) -> RegistryResult<Organization> {
        validate_org_name(name)?;

        let query = self
            .ctx
            .query(RecordKind::Org, SortOrder::HeightAsc)
            .tag(tags::ORG, name);
        let mut pager = self.ctx.pager(query);
        let mut replay = OrgReplay::new(name);

        // Drain everything: any later record can change the authorized set.
        while let Some(page) = pager.next_page().await? {
            for record in &page {
                replay.apply(record);
            }
        }

        tracing::debug!(
            applied = replay.applied(),
            skipped = replay.skipped(),
            pages = pager.pages_fetched(),
            "resolved organization",
        );
        Ok(replay.finish())
    }
}
