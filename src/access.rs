//! Authorization checks consumed by the ledger operations.
//!
//! The ledger never decides who may touch a trip on its own; it asks an
//! [`AccessPolicy`] before every read and write. The policy is injected
//! at construction time so the core stays testable in isolation.

use crate::error::StoreError;
use crate::store::LedgerStore;
use crate::types::{MemberId, TripId};

/// Answers the two questions the ledger asks about an actor.
pub trait AccessPolicy {
    /// May this member read the trip's ledger?
    fn can_view(&self, trip_id: TripId, member_id: MemberId) -> Result<bool, StoreError>;

    /// May this member create, settle or delete expenses?
    fn can_edit(&self, trip_id: TripId, member_id: MemberId) -> Result<bool, StoreError>;
}

/// Derives rights from the member roles kept with the trip: every
/// active member may view, owners and editors may edit.
///
/// The policy holds its own store handle so it can be pointed at the
/// same database as the ledger from a separate connection.
pub struct RoleBasedAccess<S> {
    store: S,
}

impl<S: LedgerStore> RoleBasedAccess<S> {
    pub fn new(store: S) -> RoleBasedAccess<S> {
        RoleBasedAccess { store }
    }
}

impl<S: LedgerStore> AccessPolicy for RoleBasedAccess<S> {
    fn can_view(&self, trip_id: TripId, member_id: MemberId) -> Result<bool, StoreError> {
        let members = self.store.members_by_trip(trip_id)?;
        Ok(members.iter().any(|m| m.id == member_id))
    }

    fn can_edit(&self, trip_id: TripId, member_id: MemberId) -> Result<bool, StoreError> {
        let members = self.store.members_by_trip(trip_id)?;
        Ok(members
            .iter()
            .any(|m| m.id == member_id && m.role.can_edit()))
    }
}

/// Grants everything. For embedding contexts where the surrounding
/// request handler has already authorized the actor.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn can_view(&self, _trip_id: TripId, _member_id: MemberId) -> Result<bool, StoreError> {
        Ok(true)
    }

    fn can_edit(&self, _trip_id: TripId, _member_id: MemberId) -> Result<bool, StoreError> {
        Ok(true)
    }
}
