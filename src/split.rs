//! Split composition: turning an expense amount and a split policy into
//! the per-participant share records that get persisted with it.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValidationError;
use crate::types::{MemberId, NewSplit, SplitPolicy, TOLERANCE};

/// Compose the splits for an expense.
///
/// Equal splits divide the amount by the number of participants,
/// rounding each share down to a cent and assigning the remainder to the
/// last participant, so the shares always sum to the amount exactly.
/// Custom splits are taken as given once they sum to the amount within
/// one cent.
///
/// The payer's own share comes back with `paid = true`; the payer does
/// not have to be among the participants.
pub fn compose_splits(
    amount: Decimal,
    paid_by: MemberId,
    policy: &SplitPolicy,
) -> Result<Vec<NewSplit>, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    if amount.round_dp(2) != amount {
        return Err(ValidationError::SubCentPrecision(amount));
    }

    match policy {
        SplitPolicy::Equal { participants } => compose_equal(amount, paid_by, participants),
        SplitPolicy::Custom { shares } => {
            let shares: Vec<(MemberId, Decimal)> =
                shares.iter().map(|s| (s.member_id, s.amount)).collect();
            compose_custom(amount, paid_by, &shares)
        }
    }
}

fn compose_equal(
    amount: Decimal,
    paid_by: MemberId,
    participants: &[MemberId],
) -> Result<Vec<NewSplit>, ValidationError> {
    if participants.is_empty() {
        return Err(ValidationError::ParticipantsNotProvided);
    }

    let head_count = Decimal::from(participants.len() as u64);
    let share = (amount / head_count).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let last_share = amount - share * (head_count - Decimal::ONE);

    let splits = participants
        .iter()
        .enumerate()
        .map(|(i, &member_id)| {
            let member_share = if i == participants.len() - 1 {
                last_share
            } else {
                share
            };
            NewSplit::new(member_id, member_share, member_id == paid_by)
        })
        .collect();
    Ok(splits)
}

fn compose_custom(
    amount: Decimal,
    paid_by: MemberId,
    shares: &[(MemberId, Decimal)],
) -> Result<Vec<NewSplit>, ValidationError> {
    if shares.is_empty() {
        return Err(ValidationError::ParticipantsNotProvided);
    }

    for &(_, share) in shares {
        if share < Decimal::ZERO {
            return Err(ValidationError::NegativeShare(share));
        }
        if share.round_dp(2) != share {
            return Err(ValidationError::SubCentPrecision(share));
        }
    }

    let total: Decimal = shares.iter().map(|&(_, share)| share).sum();
    if (total - amount).abs() > TOLERANCE {
        return Err(ValidationError::split_mismatch(amount, total));
    }

    let splits = shares
        .iter()
        .map(|&(member_id, share)| NewSplit::new(member_id, share, member_id == paid_by))
        .collect();
    Ok(splits)
}
