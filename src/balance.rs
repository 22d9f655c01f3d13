//! The core of the ledger logic: balance derivation and the algorithm
//! that computes the money transfers needed to settle debts.

use std::collections::HashMap;

use log::warn;
use rust_decimal::Decimal;

use crate::types::{Balance, Debt, MemberId, SavedExpense, TOLERANCE};

/// Running paid/owed totals for one member while folding expenses.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct MemberTotals {
    pub paid: Decimal,
    pub owed: Decimal,
}

impl MemberTotals {
    pub fn balance(&self) -> Decimal {
        self.paid - self.owed
    }
}

/// Fold one expense into the running totals.
///
/// A regular expense credits its payer with the full amount and debits
/// every split holder with their share. A settlement carries no payment
/// of its own; its two splits (negative for the sender, positive for the
/// recipient) flow through the owed side, which is how a transfer moves
/// a debt without touching the expenses that created it.
pub(crate) fn apply_expense(totals: &mut HashMap<MemberId, MemberTotals>, expense: &SavedExpense) {
    if !expense.is_settlement {
        totals.entry(expense.paid_by).or_default().paid += expense.amount;
    }
    for split in &expense.splits {
        totals.entry(split.member_id).or_default().owed += split.amount;
    }
}

/// Derive per-member balances from the full list of active expenses.
///
/// Only members with ledger activity appear in the output; a member who
/// was removed from the trip but still holds splits is included, so
/// outstanding debts of removed members stay visible. The result is
/// sorted by member id so repeated calls over the same ledger state are
/// identical.
pub fn compute_balances(expenses: &[SavedExpense]) -> Vec<Balance> {
    let mut totals: HashMap<MemberId, MemberTotals> = HashMap::new();
    for expense in expenses {
        apply_expense(&mut totals, expense);
    }

    let mut balances: Vec<_> = totals
        .into_iter()
        .map(|(member_id, t)| Balance::new(member_id, t.paid, t.owed))
        .collect();
    balances.sort_by_key(|b| b.member_id);
    balances
}

/// Compute a settlement plan: who pays whom to bring every balance to
/// zero.
///
/// Members are partitioned into debtors (balance below -0.01) and
/// creditors (balance above 0.01); anyone inside that band counts as
/// settled. Each debtor then drains creditors in list order, every draw
/// being the smaller of the remaining debt and the remaining credit,
/// until the debt is gone or the creditors run out.
///
/// The plan always transfers enough money to settle everyone, but the
/// number of transfers is not minimal; finding the true minimum is
/// NP-hard and the greedy pass is good enough for a handful of trip
/// members. Cent remainders below the tolerance are dropped rather than
/// bounced between members.
pub fn resolve_debts(balances: &[Balance]) -> Vec<Debt> {
    let debtors: Vec<(MemberId, Decimal)> = balances
        .iter()
        .filter(|b| b.balance < -TOLERANCE)
        .map(|b| (b.member_id, -b.balance))
        .collect();
    let mut creditors: Vec<(MemberId, Decimal)> = balances
        .iter()
        .filter(|b| b.balance > TOLERANCE)
        .map(|b| (b.member_id, b.balance))
        .collect();

    let mut debts = Vec::new();
    let mut next_creditor = 0;

    for (debtor, mut remaining) in debtors {
        while remaining > TOLERANCE {
            let Some((creditor, credit)) = creditors.get_mut(next_creditor) else {
                break;
            };
            let draw = remaining.min(*credit);
            if draw > TOLERANCE {
                debts.push(Debt::new(debtor, *creditor, draw));
            }
            remaining -= draw;
            *credit -= draw;
            if *credit <= TOLERANCE {
                next_creditor += 1;
            }
        }
        if remaining > TOLERANCE {
            warn!("ran out of creditors with {remaining} still owed by member {debtor}");
        }
    }

    let leftover_credit: Decimal = creditors[next_creditor.min(creditors.len())..]
        .iter()
        .map(|(_, credit)| *credit)
        .sum();
    if leftover_credit > TOLERANCE {
        warn!("ran out of debtors with {leftover_credit} still owed to creditors");
    }

    debts
}
