//! Domain entities shared by the ledger core.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub type TripId = i64;
pub type MemberId = i64;
pub type ExpenseId = i64;

/// Amounts are tracked to cent precision; comparisons tolerate one cent
/// of rounding error.
pub const TOLERANCE: Decimal = dec!(0.01);

/// A trip, as far as the ledger is concerned: an id and the currency all
/// of its expenses must share. Everything else about trips lives in the
/// trip-planning subsystem.
#[derive(Clone, Debug, Serialize)]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    pub currency: String,
}

/// What a member is allowed to do with the ledger of a trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    pub fn can_edit(&self) -> bool {
        matches!(self, Role::Owner | Role::Editor)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "owner" => Some(Role::Owner),
            "editor" => Some(Role::Editor),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }
}

/// A trip participant. Identity is immutable once created; the role can
/// change when the collaboration subsystem reassigns it.
#[derive(Clone, Debug, Serialize)]
pub struct Member {
    pub id: MemberId,
    pub trip_id: TripId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// How an expense is divided among its participants.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "policy")]
pub enum SplitPolicy {
    Equal { participants: Vec<MemberId> },
    Custom { shares: Vec<CustomShare> },
}

impl SplitPolicy {
    pub fn kind(&self) -> SplitPolicyKind {
        match self {
            SplitPolicy::Equal { .. } => SplitPolicyKind::Equal,
            SplitPolicy::Custom { .. } => SplitPolicyKind::Custom,
        }
    }
}

/// One caller-supplied share of a custom split.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomShare {
    pub member_id: MemberId,
    pub amount: Decimal,
}

impl CustomShare {
    pub fn new(member_id: MemberId, amount: Decimal) -> CustomShare {
        CustomShare { member_id, amount }
    }
}

/// The policy an expense was created with, as persisted on the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicyKind {
    Equal,
    Custom,
}

impl SplitPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitPolicyKind::Equal => "equal",
            SplitPolicyKind::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<SplitPolicyKind> {
        match value {
            "equal" => Some(SplitPolicyKind::Equal),
            "custom" => Some(SplitPolicyKind::Custom),
            _ => None,
        }
    }
}

/// An expense as submitted by a caller, before splits are composed.
#[derive(Clone, Debug, Deserialize)]
pub struct ExpenseDraft {
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    pub paid_by: MemberId,
    pub split: SplitPolicy,
}

/// An expense ready to be written, with its splits already composed.
#[derive(Clone, Debug)]
pub struct NewExpense {
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    pub paid_by: MemberId,
    pub is_settlement: bool,
    pub policy: SplitPolicyKind,
}

/// One participant's share of an expense about to be written.
///
/// Positive amounts are shares of cost (or, on a settlement, money
/// received); negative amounts pay a settlement down. `paid` marks the
/// payer's own share, which is implicitly settled.
#[derive(Clone, Debug, PartialEq)]
pub struct NewSplit {
    pub member_id: MemberId,
    pub amount: Decimal,
    pub paid: bool,
}

impl NewSplit {
    pub fn new(member_id: MemberId, amount: Decimal, paid: bool) -> NewSplit {
        NewSplit {
            member_id,
            amount,
            paid,
        }
    }
}

/// An expense read back from the store, splits embedded.
#[derive(Clone, Debug, Serialize)]
pub struct SavedExpense {
    pub id: ExpenseId,
    pub trip_id: TripId,
    pub title: String,
    pub amount: Decimal,
    pub currency: String,
    pub paid_by: MemberId,
    pub is_settlement: bool,
    pub policy: SplitPolicyKind,
    pub created_at: DateTime<Utc>,
    pub splits: Vec<SavedSplit>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SavedSplit {
    pub member_id: MemberId,
    pub amount: Decimal,
    pub paid: bool,
}

impl SavedSplit {
    pub fn new(member_id: MemberId, amount: Decimal, paid: bool) -> SavedSplit {
        SavedSplit {
            member_id,
            amount,
            paid,
        }
    }
}

/// Per-member totals derived from the ledger. Positive `balance` means
/// the member is owed money, negative means they owe.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Balance {
    pub member_id: MemberId,
    pub total_paid: Decimal,
    pub total_owed: Decimal,
    pub balance: Decimal,
}

impl Balance {
    pub fn new(member_id: MemberId, total_paid: Decimal, total_owed: Decimal) -> Balance {
        Balance {
            member_id,
            total_paid,
            total_owed,
            balance: total_paid - total_owed,
        }
    }
}

/// A directed obligation produced by the debt resolver. This is a
/// settlement plan, not a ledger fact, until someone acts on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub from_member: MemberId,
    pub to_member: MemberId,
    pub amount: Decimal,
}

impl Debt {
    pub fn new(from_member: MemberId, to_member: MemberId, amount: Decimal) -> Debt {
        Debt {
            from_member,
            to_member,
            amount,
        }
    }
}
