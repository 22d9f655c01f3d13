//! Derived views for the expense breakdown screen.
//!
//! Everything here is recomputed from the expense list on every call;
//! nothing is cached between requests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::balance::{self, MemberTotals};
use crate::types::{Balance, ExpenseId, MemberId, SavedExpense, TOLERANCE};

/// One member's cumulative position at a point in the history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunningBalance {
    pub member_id: MemberId,
    pub balance: Decimal,
}

/// One row of the chronological history: the expense itself plus every
/// active member's balance after it was applied.
#[derive(Clone, Debug, Serialize)]
pub struct LedgerEntry {
    pub expense_id: ExpenseId,
    pub title: String,
    pub amount: Decimal,
    pub paid_by: MemberId,
    pub is_settlement: bool,
    pub created_at: DateTime<Utc>,
    pub balances_after: Vec<RunningBalance>,
}

/// The full breakdown view of a trip's ledger.
#[derive(Clone, Debug, Serialize)]
pub struct TripBreakdown {
    pub entries: Vec<LedgerEntry>,
    pub balances: Vec<Balance>,
    /// Sum of all regular expenses.
    pub total_spent: Decimal,
    /// Sum of all recorded settlement transfers.
    pub total_settled: Decimal,
    /// Money still waiting to change hands (sum of positive balances).
    pub total_outstanding: Decimal,
}

/// Replay the expense history and annotate each entry with the running
/// balances, then attach the end-state aggregates.
///
/// The replay goes through the same accumulation as the balance
/// calculator, so the final entry's running balances always agree with
/// [`compute_balances`](crate::balance::compute_balances).
pub fn build_breakdown(expenses: &[SavedExpense]) -> TripBreakdown {
    let mut totals: HashMap<MemberId, MemberTotals> = HashMap::new();
    let mut entries = Vec::with_capacity(expenses.len());

    for expense in expenses {
        balance::apply_expense(&mut totals, expense);

        let mut balances_after: Vec<_> = totals
            .iter()
            .map(|(&member_id, t)| RunningBalance {
                member_id,
                balance: t.balance(),
            })
            .collect();
        balances_after.sort_by_key(|b| b.member_id);

        entries.push(LedgerEntry {
            expense_id: expense.id,
            title: expense.title.clone(),
            amount: expense.amount,
            paid_by: expense.paid_by,
            is_settlement: expense.is_settlement,
            created_at: expense.created_at,
            balances_after,
        });
    }

    let balances = balance::compute_balances(expenses);
    let total_spent = expenses
        .iter()
        .filter(|e| !e.is_settlement)
        .map(|e| e.amount)
        .sum();
    let total_settled = expenses
        .iter()
        .filter(|e| e.is_settlement)
        .map(|e| e.amount)
        .sum();
    let total_outstanding = balances
        .iter()
        .filter(|b| b.balance > TOLERANCE)
        .map(|b| b.balance)
        .sum();

    TripBreakdown {
        entries,
        balances,
        total_spent,
        total_settled,
        total_outstanding,
    }
}
