//! The ledger operations exposed to request handlers.
//!
//! This is the seam between the pure computations (balances, debts,
//! split composition) and the store: every user-initiated action comes
//! through here, gets authorized and validated, and only then touches
//! the database.

use chrono::Utc;
use log::{debug, info};
use rust_decimal::Decimal;

use crate::access::AccessPolicy;
use crate::balance::{compute_balances, resolve_debts};
use crate::error::{LedgerError, StoreError, ValidationError};
use crate::report::{self, TripBreakdown};
use crate::split::compose_splits;
use crate::store::LedgerStore;
use crate::types::{
    Balance, Debt, ExpenseDraft, ExpenseId, MemberId, NewExpense, NewSplit, SavedExpense,
    SplitPolicy, SplitPolicyKind, TripId,
};
use crate::validator::{validate_draft, validate_settlement_amount, validate_settlement_pair};

/// The expense ledger of a trip-planning application.
///
/// Holds a store handle and an access policy; all operations are
/// synchronous and recompute derived data from committed rows, so two
/// calls with no write in between always agree.
pub struct TripLedger<S, A> {
    store: S,
    access: A,
}

impl<S: LedgerStore, A: AccessPolicy> TripLedger<S, A> {
    pub fn new(store: S, access: A) -> TripLedger<S, A> {
        TripLedger { store, access }
    }

    /// Per-member balances for a trip, derived fresh from the store.
    pub fn balances(
        &self,
        trip_id: TripId,
        acting_user: MemberId,
    ) -> Result<Vec<Balance>, LedgerError> {
        self.ensure_can_view(trip_id, acting_user)?;
        let expenses = self.store.expenses_by_trip(trip_id)?;
        Ok(compute_balances(&expenses))
    }

    /// The settlement plan for a trip: who pays whom to clear all debts.
    pub fn debts(&self, trip_id: TripId, acting_user: MemberId) -> Result<Vec<Debt>, LedgerError> {
        let balances = self.balances(trip_id, acting_user)?;
        Ok(resolve_debts(&balances))
    }

    /// Validate a draft, compose its splits and write the expense.
    ///
    /// The expense and every split are committed in one transaction; a
    /// rejected draft leaves the ledger untouched.
    pub fn add_expense(
        &mut self,
        trip_id: TripId,
        acting_user: MemberId,
        draft: &ExpenseDraft,
    ) -> Result<SavedExpense, LedgerError> {
        self.ensure_can_edit(trip_id, acting_user)?;

        let trip = self.store.trip(trip_id)?;
        let members = self.store.members_by_trip(trip_id)?;
        validate_draft(draft, &trip.currency, &members)?;

        let splits = compose_splits(draft.amount, draft.paid_by, &draft.split)?;
        let expense = NewExpense {
            title: draft.title.clone(),
            amount: draft.amount,
            currency: draft.currency.clone(),
            paid_by: draft.paid_by,
            is_settlement: false,
            policy: draft.split.kind(),
        };

        let saved = self
            .store
            .insert_expense(trip_id, &expense, &splits, Utc::now())?;
        debug!(
            "member {acting_user} added expense {} of {} to trip {trip_id}",
            saved.id, saved.amount
        );
        Ok(saved)
    }

    /// Record a payment against a debt, in full or partially.
    ///
    /// The amount is checked against the outstanding debt recomputed
    /// from the current ledger, not against the possibly stale `debt`
    /// the caller holds. The settlement lands as an additive entry: two
    /// splits that cancel each other out, leaving the contributing
    /// expenses untouched and the next recomputation consistent.
    pub fn record_settlement(
        &mut self,
        trip_id: TripId,
        acting_user: MemberId,
        debt: &Debt,
        amount: Decimal,
    ) -> Result<SavedExpense, LedgerError> {
        self.ensure_can_edit(trip_id, acting_user)?;
        validate_settlement_pair(debt)?;

        let trip = self.store.trip(trip_id)?;
        let expenses = self.store.expenses_by_trip(trip_id)?;
        let outstanding = outstanding_between(&expenses, debt.from_member, debt.to_member);
        validate_settlement_amount(amount, outstanding)?;

        let expense = NewExpense {
            title: "settlement".to_string(),
            amount,
            currency: trip.currency,
            paid_by: debt.from_member,
            is_settlement: true,
            policy: SplitPolicyKind::Custom,
        };
        let splits = vec![
            NewSplit::new(debt.from_member, -amount, true),
            NewSplit::new(debt.to_member, amount, false),
        ];

        let saved = self
            .store
            .insert_expense(trip_id, &expense, &splits, Utc::now())?;
        info!(
            "member {acting_user} recorded a settlement of {amount} from {} to {} on trip {trip_id}",
            debt.from_member, debt.to_member
        );
        Ok(saved)
    }

    /// Replace the splits of an existing expense.
    ///
    /// The old splits are dropped and recreated in one transaction, so
    /// no reader observes the expense half-split. Settlements cannot be
    /// edited this way; delete and re-record them instead.
    pub fn resplit_expense(
        &mut self,
        trip_id: TripId,
        acting_user: MemberId,
        expense_id: ExpenseId,
        split: &SplitPolicy,
    ) -> Result<(), LedgerError> {
        self.ensure_can_edit(trip_id, acting_user)?;

        let expenses = self.store.expenses_by_trip(trip_id)?;
        let expense = expenses
            .iter()
            .find(|e| e.id == expense_id)
            .ok_or(StoreError::ExpenseNotFound(expense_id))?;
        if expense.is_settlement {
            return Err(ValidationError::SettlementNotEditable.into());
        }

        let members = self.store.members_by_trip(trip_id)?;
        let draft = ExpenseDraft {
            title: expense.title.clone(),
            amount: expense.amount,
            currency: expense.currency.clone(),
            paid_by: expense.paid_by,
            split: split.clone(),
        };
        validate_draft(&draft, &expense.currency, &members)?;

        let splits = compose_splits(expense.amount, expense.paid_by, split)?;
        self.store
            .replace_splits(expense_id, split.kind(), &splits)?;
        debug!("member {acting_user} re-split expense {expense_id} on trip {trip_id}");
        Ok(())
    }

    /// Delete an expense (or a recorded settlement) and its splits.
    pub fn delete_expense(
        &mut self,
        trip_id: TripId,
        acting_user: MemberId,
        expense_id: ExpenseId,
    ) -> Result<(), LedgerError> {
        self.ensure_can_edit(trip_id, acting_user)?;
        self.store.delete_expense(trip_id, expense_id)?;
        info!("member {acting_user} deleted expense {expense_id} on trip {trip_id}");
        Ok(())
    }

    /// The breakdown view: chronological history with running balances
    /// and the trip-level aggregates.
    pub fn breakdown(
        &self,
        trip_id: TripId,
        acting_user: MemberId,
    ) -> Result<TripBreakdown, LedgerError> {
        self.ensure_can_view(trip_id, acting_user)?;
        let expenses = self.store.expenses_by_trip(trip_id)?;
        Ok(report::build_breakdown(&expenses))
    }

    fn ensure_can_view(&self, trip_id: TripId, member_id: MemberId) -> Result<(), LedgerError> {
        if self.access.can_view(trip_id, member_id)? {
            Ok(())
        } else {
            Err(LedgerError::permission_denied(trip_id, member_id))
        }
    }

    fn ensure_can_edit(&self, trip_id: TripId, member_id: MemberId) -> Result<(), LedgerError> {
        if self.access.can_edit(trip_id, member_id)? {
            Ok(())
        } else {
            Err(LedgerError::permission_denied(trip_id, member_id))
        }
    }
}

/// What the resolver currently reports as owed between a specific pair.
fn outstanding_between(
    expenses: &[SavedExpense],
    from_member: MemberId,
    to_member: MemberId,
) -> Decimal {
    resolve_debts(&compute_balances(expenses))
        .iter()
        .filter(|d| d.from_member == from_member && d.to_member == to_member)
        .map(|d| d.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::access::AllowAll;
    use crate::error::StoreError;
    use crate::store::sqlite::SqliteLedgerStore;
    use crate::types::{CustomShare, Role, TOLERANCE};

    use super::*;

    struct DenyAll;

    impl AccessPolicy for DenyAll {
        fn can_view(&self, _: TripId, _: MemberId) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn can_edit(&self, _: TripId, _: MemberId) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    fn ledger_with_trip() -> (TripLedger<SqliteLedgerStore, AllowAll>, TripId, Vec<MemberId>) {
        let mut store = SqliteLedgerStore::in_memory().unwrap();
        let trip_id = store.create_trip("Lisbon", "EUR").unwrap();
        let members = vec![
            store.add_member(trip_id, "Ada", "ada@example.com", Role::Owner).unwrap(),
            store.add_member(trip_id, "Ben", "ben@example.com", Role::Editor).unwrap(),
            store.add_member(trip_id, "Cleo", "cleo@example.com", Role::Editor).unwrap(),
        ];
        (TripLedger::new(store, AllowAll), trip_id, members)
    }

    fn meal_draft(paid_by: MemberId, participants: Vec<MemberId>) -> ExpenseDraft {
        ExpenseDraft {
            title: "dinner".to_string(),
            amount: dec!(300),
            currency: "EUR".to_string(),
            paid_by,
            split: SplitPolicy::Equal { participants },
        }
    }

    #[test]
    fn test_expense_then_balances_then_debts() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();

        let balances = ledger.balances(trip_id, m[0]).unwrap();
        let payer = balances.iter().find(|b| b.member_id == m[0]).unwrap();
        assert_eq!(payer.balance, dec!(200));

        let debts = ledger.debts(trip_id, m[0]).unwrap();
        assert_eq!(debts.len(), 2);
        assert!(debts.iter().all(|d| d.to_member == m[0] && d.amount == dec!(100)));
    }

    #[test]
    fn test_full_settlements_clear_the_trip() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();

        for debt in ledger.debts(trip_id, m[0]).unwrap() {
            let amount = debt.amount;
            ledger
                .record_settlement(trip_id, debt.from_member, &debt, amount)
                .unwrap();
        }

        let balances = ledger.balances(trip_id, m[0]).unwrap();
        assert!(balances.iter().all(|b| b.balance.abs() <= TOLERANCE));
        assert!(ledger.debts(trip_id, m[0]).unwrap().is_empty());
    }

    #[test]
    fn test_partial_settlement_leaves_remainder() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();

        let debt = Debt::new(m[1], m[0], dec!(100));
        ledger
            .record_settlement(trip_id, m[1], &debt, dec!(40))
            .unwrap();

        let debts = ledger.debts(trip_id, m[0]).unwrap();
        let remaining = debts
            .iter()
            .find(|d| d.from_member == m[1] && d.to_member == m[0])
            .unwrap();
        assert_eq!(remaining.amount, dec!(60));
    }

    #[test]
    fn test_settlement_checked_against_current_ledger_not_stale_debt() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();

        // both callers hold the same debt snapshot
        let stale = Debt::new(m[1], m[0], dec!(100));
        ledger
            .record_settlement(trip_id, m[1], &stale, dec!(80))
            .unwrap();

        let result = ledger.record_settlement(trip_id, m[1], &stale, dec!(100));
        match result {
            Err(LedgerError::Validation(ValidationError::InvalidSettlementAmount {
                outstanding,
                ..
            })) => assert_eq!(outstanding, dec!(20)),
            other => panic!("expected a settlement amount error, got {other:?}"),
        }
    }

    #[test]
    fn test_overpaying_a_debt_is_rejected() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();

        let debt = Debt::new(m[1], m[0], dec!(100));
        let result = ledger.record_settlement(trip_id, m[1], &debt, dec!(150));
        assert!(matches!(
            result,
            Err(LedgerError::Validation(
                ValidationError::InvalidSettlementAmount { .. }
            ))
        ));
    }

    #[test]
    fn test_rejected_draft_writes_nothing() {
        let (mut ledger, trip_id, m) = ledger_with_trip();

        let draft = ExpenseDraft {
            title: "hotel".to_string(),
            amount: dec!(250),
            currency: "EUR".to_string(),
            paid_by: m[0],
            split: SplitPolicy::Custom {
                shares: vec![
                    CustomShare::new(m[0], dec!(100)),
                    CustomShare::new(m[1], dec!(100)),
                ],
            },
        };
        let result = ledger.add_expense(trip_id, m[0], &draft);
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::SplitMismatch { .. }))
        ));

        assert!(ledger.balances(trip_id, m[0]).unwrap().is_empty());
    }

    #[test]
    fn test_resplit_replaces_shares() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        let saved = ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();

        let custom = SplitPolicy::Custom {
            shares: vec![
                CustomShare::new(m[0], dec!(100)),
                CustomShare::new(m[1], dec!(200)),
            ],
        };
        ledger
            .resplit_expense(trip_id, m[0], saved.id, &custom)
            .unwrap();

        let balances = ledger.balances(trip_id, m[0]).unwrap();
        let payer = balances.iter().find(|b| b.member_id == m[0]).unwrap();
        assert_eq!(payer.balance, dec!(200));
        let other = balances.iter().find(|b| b.member_id == m[1]).unwrap();
        assert_eq!(other.balance, dec!(-200));
    }

    #[test]
    fn test_settlements_cannot_be_resplit() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();
        let debt = Debt::new(m[1], m[0], dec!(100));
        let settlement = ledger
            .record_settlement(trip_id, m[1], &debt, dec!(100))
            .unwrap();

        let result = ledger.resplit_expense(
            trip_id,
            m[0],
            settlement.id,
            &SplitPolicy::Equal {
                participants: vec![m[0], m[1]],
            },
        );
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::SettlementNotEditable))
        ));
    }

    #[test]
    fn test_deleting_an_expense_restores_balances() {
        let (mut ledger, trip_id, m) = ledger_with_trip();
        let saved = ledger
            .add_expense(trip_id, m[0], &meal_draft(m[0], m.clone()))
            .unwrap();

        ledger.delete_expense(trip_id, m[0], saved.id).unwrap();

        assert!(ledger.balances(trip_id, m[0]).unwrap().is_empty());
        assert!(ledger.debts(trip_id, m[0]).unwrap().is_empty());
    }

    #[test]
    fn test_denied_actor_cannot_read_or_write() {
        let store = SqliteLedgerStore::in_memory().unwrap();
        let mut ledger = TripLedger::new(store, DenyAll);

        assert!(matches!(
            ledger.balances(1, 1),
            Err(LedgerError::PermissionDenied { .. })
        ));
        assert!(matches!(
            ledger.add_expense(1, 1, &meal_draft(1, vec![1])),
            Err(LedgerError::PermissionDenied { .. })
        ));
    }
}
