use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{ExpenseId, MemberId, TripId};

/// Errors caused by invalid caller input.
///
/// These are detected before any write and are safe to show to the user
/// as a validation message. The ledger is untouched when one is returned.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("the expense amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("amounts are tracked to cent precision, got {0}")]
    SubCentPrecision(Decimal),

    #[error("there must be at least one participant in the split")]
    ParticipantsNotProvided,

    #[error("member {0} appears more than once in the split")]
    DuplicateParticipant(MemberId),

    #[error("split shares cannot be negative, got {0}")]
    NegativeShare(Decimal),

    #[error("the splits sum to {actual} but the expense amount is {expected}")]
    SplitMismatch { expected: Decimal, actual: Decimal },

    #[error("settlement amount {amount} is outside the outstanding debt of {outstanding}")]
    InvalidSettlementAmount {
        amount: Decimal,
        outstanding: Decimal,
    },

    #[error("expense currency `{expense}` does not match the trip currency `{trip}`")]
    CurrencyMismatch { expense: String, trip: String },

    #[error("member {0} is not an active member of this trip")]
    UnknownMember(MemberId),

    #[error("settlements cannot be re-split or edited, only deleted")]
    SettlementNotEditable,

    #[error("a settlement must involve two distinct members, got member {0} on both sides")]
    SelfSettlement(MemberId),
}

impl ValidationError {
    pub fn split_mismatch(expected: Decimal, actual: Decimal) -> Self {
        ValidationError::SplitMismatch { expected, actual }
    }

    pub fn invalid_settlement_amount(amount: Decimal, outstanding: Decimal) -> Self {
        ValidationError::InvalidSettlementAmount {
            amount,
            outstanding,
        }
    }

    pub fn currency_mismatch(expense: &str, trip: &str) -> Self {
        ValidationError::CurrencyMismatch {
            expense: expense.to_string(),
            trip: trip.to_string(),
        }
    }
}

/// Errors surfaced by a [`LedgerStore`](crate::store::LedgerStore)
/// implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transient infrastructure failure. The caller may retry; the core
    /// never retries on its own.
    #[error("the ledger store is unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("trip {0} does not exist")]
    TripNotFound(TripId),

    #[error("expense {0} does not exist")]
    ExpenseNotFound(ExpenseId),

    #[error("constraint violation: {0}")]
    Constraint(String),

    /// An expense row was written but its splits were not, and the
    /// compensating delete has already run. Only store implementations
    /// that cannot write atomically ever produce this.
    #[error("expense {expense_id} was written without its splits and has been removed: {message}")]
    PartialWrite {
        expense_id: ExpenseId,
        message: String,
    },

    /// A row came back in a shape the mapping layer refuses to guess at.
    #[error("unexpected row shape in the ledger store: {0}")]
    Corrupted(String),
}

impl StoreError {
    pub fn unavailable<T: AsRef<str>>(message: T, source: anyhow::Error) -> Self {
        StoreError::Unavailable {
            message: message.as_ref().to_string(),
            source,
        }
    }

    pub fn constraint<T: AsRef<str>>(message: T) -> Self {
        StoreError::Constraint(message.as_ref().to_string())
    }

    pub fn corrupted<T: AsRef<str>>(message: T) -> Self {
        StoreError::Corrupted(message.as_ref().to_string())
    }
}

/// Top-level error of the ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("member {member} does not have the required rights on trip {trip}")]
    PermissionDenied { trip: TripId, member: MemberId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    pub fn permission_denied(trip: TripId, member: MemberId) -> Self {
        LedgerError::PermissionDenied { trip, member }
    }
}
