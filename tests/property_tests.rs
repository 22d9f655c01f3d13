//! Property-based tests for the invariants the ledger promises.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;

use tripsplit::balance::{compute_balances, resolve_debts};
use tripsplit::split::compose_splits;
use tripsplit::types::{
    Balance, CustomShare, MemberId, SavedExpense, SavedSplit, SplitPolicy, SplitPolicyKind,
    TOLERANCE,
};

const MEMBER_COUNT: i64 = 5;

fn cents(value: i64) -> Decimal {
    Decimal::new(value, 2)
}

/// A regular expense with a random payer, amount and participant set,
/// its splits composed the same way the ledger composes them.
fn arb_expense() -> impl Strategy<Value = SavedExpense> {
    (
        1..=MEMBER_COUNT,
        1i64..=100_000,
        proptest::collection::vec(any::<bool>(), MEMBER_COUNT as usize),
    )
        .prop_map(|(paid_by, amount_cents, mask)| {
            let mut participants: Vec<MemberId> = mask
                .iter()
                .enumerate()
                .filter_map(|(i, &included)| included.then_some(i as MemberId + 1))
                .collect();
            if participants.is_empty() {
                participants.push(paid_by);
            }

            let amount = cents(amount_cents);
            let splits = compose_splits(amount, paid_by, &SplitPolicy::Equal { participants })
                .expect("valid inputs always compose");

            SavedExpense {
                id: 0,
                trip_id: 1,
                title: "expense".to_string(),
                amount,
                currency: "EUR".to_string(),
                paid_by,
                is_settlement: false,
                policy: SplitPolicyKind::Equal,
                created_at: DateTime::<Utc>::MIN_UTC,
                splits: splits
                    .into_iter()
                    .map(|s| SavedSplit::new(s.member_id, s.amount, s.paid))
                    .collect(),
            }
        })
}

fn arb_ledger() -> impl Strategy<Value = Vec<SavedExpense>> {
    proptest::collection::vec(arb_expense(), 1..=12)
}

/// Balance sets whose entries are multiples of five cents and sum to
/// zero, so no member sits inside the settled band and the greedy pass
/// has no cent dust to drop.
fn arb_clean_balances() -> impl Strategy<Value = Vec<Balance>> {
    proptest::collection::vec(-2_000i64..=2_000, 2..=8).prop_map(|nickels| {
        let mut balances: Vec<Balance> = nickels
            .iter()
            .enumerate()
            .map(|(i, &n)| signed_balance(i as MemberId + 1, cents(n * 5)))
            .collect();

        let total: Decimal = balances.iter().map(|b| b.balance).sum();
        let last = balances.len() - 1;
        let counterweight = balances[last].balance - total;
        balances[last] = signed_balance(last as MemberId + 1, counterweight);
        balances
    })
}

fn signed_balance(member_id: MemberId, balance: Decimal) -> Balance {
    if balance >= Decimal::ZERO {
        Balance::new(member_id, balance, Decimal::ZERO)
    } else {
        Balance::new(member_id, Decimal::ZERO, -balance)
    }
}

fn apply_debts(balances: &[Balance], debts: &[tripsplit::types::Debt]) -> HashMap<MemberId, Decimal> {
    let mut net: HashMap<MemberId, Decimal> =
        balances.iter().map(|b| (b.member_id, b.balance)).collect();
    for debt in debts {
        *net.entry(debt.from_member).or_default() += debt.amount;
        *net.entry(debt.to_member).or_default() -= debt.amount;
    }
    net
}

proptest! {
    /// Money is conserved: what was paid equals what is owed.
    #[test]
    fn conservation_holds_over_any_expense_sequence(expenses in arb_ledger()) {
        let balances = compute_balances(&expenses);

        let total_paid: Decimal = balances.iter().map(|b| b.total_paid).sum();
        let total_owed: Decimal = balances.iter().map(|b| b.total_owed).sum();
        prop_assert!((total_paid - total_owed).abs() <= TOLERANCE);

        let net: Decimal = balances.iter().map(|b| b.balance).sum();
        prop_assert!(net.abs() <= TOLERANCE);
    }

    /// Equal splits always sum back to the expense amount, exactly.
    #[test]
    fn equal_splits_sum_exactly(
        amount_cents in 1i64..=1_000_000,
        head_count in 1usize..=12,
    ) {
        let amount = cents(amount_cents);
        let participants: Vec<MemberId> = (1..=head_count as i64).collect();
        let splits = compose_splits(amount, 1, &SplitPolicy::Equal { participants }).unwrap();

        let sum: Decimal = splits.iter().map(|s| s.amount).sum();
        prop_assert_eq!(sum, amount);
        prop_assert!(splits.iter().all(|s| s.amount >= Decimal::ZERO));
    }

    /// Custom splits are accepted exactly when they add up.
    #[test]
    fn custom_splits_accepted_iff_sum_matches(shares_cents in proptest::collection::vec(0i64..=50_000, 1..=8)) {
        let shares: Vec<CustomShare> = shares_cents
            .iter()
            .enumerate()
            .map(|(i, &c)| CustomShare::new(i as MemberId + 1, cents(c)))
            .collect();
        let total: Decimal = shares.iter().map(|s| s.amount).sum();

        if total > Decimal::ZERO {
            let ok = compose_splits(total, 1, &SplitPolicy::Custom { shares: shares.clone() });
            prop_assert!(ok.is_ok());
        }

        let off = compose_splits(
            total + Decimal::ONE,
            1,
            &SplitPolicy::Custom { shares },
        );
        prop_assert!(off.is_err());
    }

    /// Recomputing balances without intervening writes changes nothing.
    #[test]
    fn recomputation_is_idempotent(expenses in arb_ledger()) {
        prop_assert_eq!(compute_balances(&expenses), compute_balances(&expenses));
    }

    /// On balance sets with no sub-cent residue, paying every planned
    /// debt in full brings every member exactly to zero.
    #[test]
    fn clean_balance_sets_settle_exactly(balances in arb_clean_balances()) {
        let debts = resolve_debts(&balances);

        prop_assert!(debts.iter().all(|d| d.amount > Decimal::ZERO));
        for (member, net) in apply_debts(&balances, &debts) {
            prop_assert!(
                net.abs() <= TOLERANCE,
                "member {} left with {} after settling", member, net
            );
        }
    }

    /// On arbitrary ledgers the plan settles everyone too, up to the
    /// cent dust the tolerance band can leave per member.
    #[test]
    fn expense_ledgers_settle_within_cent_dust(expenses in arb_ledger()) {
        let balances = compute_balances(&expenses);
        let debts = resolve_debts(&balances);

        let dust_bound = TOLERANCE * Decimal::from(balances.len().max(1) as u64);
        for (member, net) in apply_debts(&balances, &debts) {
            prop_assert!(
                net.abs() <= dust_bound,
                "member {} left with {} after settling", member, net
            );
        }
    }

    /// Partially paying a planned debt shrinks it by exactly the paid
    /// amount on the next recomputation.
    #[test]
    fn partial_settlement_is_monotonic(expenses in arb_ledger(), fraction in 1u32..=99) {
        let debts = resolve_debts(&compute_balances(&expenses));
        prop_assume!(!debts.is_empty());

        let debt = &debts[0];
        let debt_cents = (debt.amount * Decimal::ONE_HUNDRED).trunc();
        let paid_cents = (debt_cents * Decimal::from(fraction) / Decimal::from(100u32)).trunc();
        prop_assume!(paid_cents > Decimal::ZERO);
        let paid = paid_cents / Decimal::ONE_HUNDRED;

        let mut with_settlement = expenses.clone();
        with_settlement.push(SavedExpense {
            id: 9_999,
            trip_id: 1,
            title: "settlement".to_string(),
            amount: paid,
            currency: "EUR".to_string(),
            paid_by: debt.from_member,
            is_settlement: true,
            policy: SplitPolicyKind::Custom,
            created_at: DateTime::<Utc>::MIN_UTC,
            splits: vec![
                SavedSplit::new(debt.from_member, -paid, true),
                SavedSplit::new(debt.to_member, paid, false),
            ],
        });

        let remaining: Decimal = resolve_debts(&compute_balances(&with_settlement))
            .iter()
            .filter(|d| d.from_member == debt.from_member && d.to_member == debt.to_member)
            .map(|d| d.amount)
            .sum();
        let expected = debt.amount - paid;
        prop_assert!(
            (remaining - expected).abs() <= TOLERANCE,
            "expected {} left between the pair, resolver reports {}", expected, remaining
        );
    }
}
