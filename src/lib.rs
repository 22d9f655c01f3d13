//! # tripsplit
//!
//! The expense-splitting ledger and settlement engine behind a
//! collaborative trip-planning application.
//!
//! Trip members record shared expenses, split them equally or with
//! custom shares, see who owes whom, and pay debts down in full or in
//! part. All derived numbers (balances, settlement plans, breakdowns)
//! are recomputed from the stored ledger on every call; settlements are
//! additive entries that never touch the expenses which created the
//! debt, which is what keeps partial payments and concurrent edits
//! consistent.
//!
//! ## Architecture
//!
//! - **types** — Domain entities: trips, members, expenses, splits,
//!   balances, debts
//! - **split** — Composes per-participant shares from a split policy
//! - **balance** — Balance derivation and the greedy debt resolver
//! - **ledger** — The authorized operations consumed by request handlers
//! - **report** — The breakdown view with running balances
//! - **store** — The storage trait and its SQLite implementation
//! - **access** — Authorization seam (role-based by default)

pub mod access;
pub mod balance;
pub mod error;
pub mod ledger;
pub mod report;
pub mod split;
pub mod store;
pub mod types;
pub mod validator;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::access::{AccessPolicy, AllowAll, RoleBasedAccess};
    pub use crate::balance::{compute_balances, resolve_debts};
    pub use crate::error::{LedgerError, StoreError, ValidationError};
    pub use crate::ledger::TripLedger;
    pub use crate::report::TripBreakdown;
    pub use crate::split::compose_splits;
    pub use crate::store::sqlite::SqliteLedgerStore;
    pub use crate::store::LedgerStore;
    pub use crate::types::{
        Balance, CustomShare, Debt, ExpenseDraft, Member, Role, SavedExpense, SplitPolicy, Trip,
    };
}
