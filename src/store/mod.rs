//! Persistent representation of the ledger.

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{
    ExpenseId, Member, MemberId, NewExpense, NewSplit, Role, SavedExpense, SplitPolicyKind, Trip,
    TripId,
};

type StoreResult<T> = Result<T, StoreError>;

pub mod sqlite;

/// This trait abstracts over the ledger storage backend.
///
/// The reference implementation keeps the data in SQLite; a deployment
/// can substitute any relational store that honors the transactional
/// guarantees spelled out on the write methods.
pub trait LedgerStore {
    /// Create a trip with the given name and currency.
    fn create_trip(&mut self, name: &str, currency: &str) -> StoreResult<TripId>;

    /// Fetch a trip by id.
    fn trip(&self, trip_id: TripId) -> StoreResult<Trip>;

    /// Add a member to a trip. Fails if the email is already registered
    /// on the trip.
    fn add_member(
        &mut self,
        trip_id: TripId,
        name: &str,
        email: &str,
        role: Role,
    ) -> StoreResult<MemberId>;

    /// Change a member's role.
    fn update_member_role(
        &mut self,
        trip_id: TripId,
        member_id: MemberId,
        role: Role,
    ) -> StoreResult<()>;

    /// Remove a member from a trip.
    ///
    /// The member's splits survive, so their outstanding debts remain
    /// visible in the balances.
    fn remove_member(&mut self, trip_id: TripId, member_id: MemberId) -> StoreResult<()>;

    /// Get all active members of a trip.
    fn members_by_trip(&self, trip_id: TripId) -> StoreResult<Vec<Member>>;

    /// Write an expense and all of its splits as one atomic operation.
    ///
    /// Either the expense and every split land together or nothing is
    /// written; no reader may ever observe an expense without its splits.
    fn insert_expense(
        &mut self,
        trip_id: TripId,
        expense: &NewExpense,
        splits: &[NewSplit],
        created_at: DateTime<Utc>,
    ) -> StoreResult<SavedExpense>;

    /// Replace the splits of an existing expense atomically.
    ///
    /// Used for corrective split edits; the old splits are dropped and
    /// recreated, and the stored policy updated, in one transaction.
    fn replace_splits(
        &mut self,
        expense_id: ExpenseId,
        policy: SplitPolicyKind,
        splits: &[NewSplit],
    ) -> StoreResult<()>;

    /// Delete the expense with the given id and, with it, its splits.
    ///
    /// The implementation may delete the row or just mark it; the only
    /// requirement is that it no longer shows up in
    /// [`expenses_by_trip`](LedgerStore::expenses_by_trip).
    fn delete_expense(&mut self, trip_id: TripId, expense_id: ExpenseId) -> StoreResult<()>;

    /// Get all active expenses of a trip, splits embedded, in
    /// chronological order.
    fn expenses_by_trip(&self, trip_id: TripId) -> StoreResult<Vec<SavedExpense>>;
}
