//! Functions that check the validity of caller input.
//!
//! These run after a draft has been received and before anything is
//! written, so a rejected operation leaves the ledger exactly as it was.

use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::types::{Debt, ExpenseDraft, Member, MemberId, SplitPolicy, TOLERANCE};

/// Sanity checks on a submitted expense draft.
///
/// List of checks:
/// - the currency matches the trip currency
/// - the payer is an active member of the trip
/// - every participant is an active member of the trip
/// - no participant appears twice in the split
///
/// Amount and share checks live in the split composer, which runs next.
pub fn validate_draft(
    draft: &ExpenseDraft,
    trip_currency: &str,
    members: &[Member],
) -> Result<(), ValidationError> {
    currency_matches(&draft.currency, trip_currency)?;

    let active: HashSet<MemberId> = members.iter().map(|m| m.id).collect();
    is_member(draft.paid_by, &active)?;

    let participants = participant_ids(&draft.split);
    no_duplicate_participants(&participants)?;
    for member_id in participants {
        is_member(member_id, &active)?;
    }

    Ok(())
}

/// Check a settlement amount against the outstanding debt it pays down.
///
/// The outstanding amount is whatever the resolver currently reports for
/// the pair, not what the caller believes it is, so a stale `Debt` held
/// by a client cannot overpay.
pub fn validate_settlement_amount(
    amount: Decimal,
    outstanding: Decimal,
) -> Result<(), ValidationError> {
    if amount <= Decimal::ZERO || amount > outstanding + TOLERANCE {
        return Err(ValidationError::invalid_settlement_amount(
            amount,
            outstanding,
        ));
    }
    if amount.round_dp(2) != amount {
        return Err(ValidationError::SubCentPrecision(amount));
    }
    Ok(())
}

/// A settlement must move money between two distinct members.
pub fn validate_settlement_pair(debt: &Debt) -> Result<(), ValidationError> {
    if debt.from_member == debt.to_member {
        return Err(ValidationError::SelfSettlement(debt.from_member));
    }
    Ok(())
}

fn currency_matches(expense_currency: &str, trip_currency: &str) -> Result<(), ValidationError> {
    if expense_currency != trip_currency {
        return Err(ValidationError::currency_mismatch(
            expense_currency,
            trip_currency,
        ));
    }
    Ok(())
}

fn is_member(member_id: MemberId, active: &HashSet<MemberId>) -> Result<(), ValidationError> {
    if !active.contains(&member_id) {
        return Err(ValidationError::UnknownMember(member_id));
    }
    Ok(())
}

fn no_duplicate_participants(participants: &[MemberId]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for &member_id in participants {
        if !seen.insert(member_id) {
            return Err(ValidationError::DuplicateParticipant(member_id));
        }
    }
    Ok(())
}

fn participant_ids(policy: &SplitPolicy) -> Vec<MemberId> {
    match policy {
        SplitPolicy::Equal { participants } => participants.clone(),
        SplitPolicy::Custom { shares } => shares.iter().map(|s| s.member_id).collect(),
    }
}
