//! The implementation of the ledger store using SQLite.

use std::collections::HashMap;
use std::path::Path;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::types::{
    ExpenseId, Member, MemberId, NewExpense, NewSplit, Role, SavedExpense, SavedSplit,
    SplitPolicyKind, Trip, TripId,
};

use super::{LedgerStore, StoreResult};

mod schema;

pub struct SqliteLedgerStore {
    connection: Connection,
}

impl SqliteLedgerStore {
    /// Open (and create, if needed) a ledger database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<SqliteLedgerStore> {
        let connection = Connection::open(path)
            .map_err(|e| StoreError::unavailable("cannot open the ledger database", e.into()))?;
        Self::with_connection(connection)
    }

    /// Open a throwaway in-memory ledger database.
    pub fn in_memory() -> StoreResult<SqliteLedgerStore> {
        let connection = Connection::open_in_memory()
            .map_err(|e| StoreError::unavailable("cannot open the ledger database", e.into()))?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> StoreResult<SqliteLedgerStore> {
        schema::create_all_tables(&connection)
            .map_err(|e| StoreError::unavailable("cannot create the ledger tables", e))?;
        Ok(SqliteLedgerStore { connection })
    }

    fn trip_exists(tx: &rusqlite::Transaction, trip_id: TripId) -> anyhow::Result<()> {
        let found: Option<i64> = tx
            .query_row(
                "SELECT id FROM trip WHERE id = ?1",
                params![&trip_id],
                |row| row.get(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(StoreError::TripNotFound(trip_id).into());
        }
        Ok(())
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn create_trip(&mut self, name: &str, currency: &str) -> StoreResult<TripId> {
        let fn_impl = || {
            let trip_id: i64 = self.connection.query_row(
                "INSERT INTO trip (name, currency) VALUES (?1, ?2) RETURNING id",
                params![&name, &currency],
                |row| row.get(0),
            )?;
            debug!("created trip {trip_id} with currency {currency}");
            Ok(trip_id)
        };

        fn_impl().map_err(|e| map_error("cannot create trip", e))
    }

    fn trip(&self, trip_id: TripId) -> StoreResult<Trip> {
        let fn_impl = || {
            let trip = self
                .connection
                .query_row(
                    "SELECT id, name, currency FROM trip WHERE id = ?1",
                    params![&trip_id],
                    |row| {
                        Ok(Trip {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            currency: row.get(2)?,
                        })
                    },
                )
                .optional()?;

            trip.ok_or_else(|| StoreError::TripNotFound(trip_id).into())
        };

        fn_impl().map_err(|e| map_error("cannot get trip", e))
    }

    fn add_member(
        &mut self,
        trip_id: TripId,
        name: &str,
        email: &str,
        role: Role,
    ) -> StoreResult<MemberId> {
        let fn_impl = || {
            let member_id = self
                .connection
                .query_row(
                    "INSERT INTO member (trip_id, name, email, role) VALUES (?1, ?2, ?3, ?4)
                     RETURNING id",
                    params![&trip_id, &name, &email, &role.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| -> anyhow::Error {
                    if constraint_violation(&e) {
                        StoreError::constraint(format!(
                            "a member with email `{email}` already exists on trip {trip_id}"
                        ))
                        .into()
                    } else {
                        e.into()
                    }
                })?;
            Ok(member_id)
        };

        fn_impl().map_err(|e| map_error("cannot add member", e))
    }

    fn update_member_role(
        &mut self,
        trip_id: TripId,
        member_id: MemberId,
        role: Role,
    ) -> StoreResult<()> {
        let fn_impl = || {
            let updated = self.connection.execute(
                "UPDATE member SET role = ?1
                 WHERE trip_id = ?2 AND id = ?3 AND removed_at IS NULL",
                params![&role.as_str(), &trip_id, &member_id],
            )?;
            if updated == 0 {
                return Err(StoreError::constraint(format!(
                    "member {member_id} is not an active member of trip {trip_id}"
                ))
                .into());
            }
            Ok(())
        };

        fn_impl().map_err(|e| map_error("cannot update member role", e))
    }

    fn remove_member(&mut self, trip_id: TripId, member_id: MemberId) -> StoreResult<()> {
        debug!("Removing member. Trip ID: {trip_id}. Member ID: {member_id}");
        let fn_impl = || {
            let removed = self.connection.execute(
                "UPDATE member SET removed_at = CURRENT_TIMESTAMP
                 WHERE trip_id = ?1 AND id = ?2 AND removed_at IS NULL",
                params![&trip_id, &member_id],
            )?;
            if removed == 0 {
                return Err(StoreError::constraint(format!(
                    "member {member_id} is not an active member of trip {trip_id}"
                ))
                .into());
            }
            Ok(())
        };

        fn_impl().map_err(|e| map_error("cannot remove member", e))
    }

    fn members_by_trip(&self, trip_id: TripId) -> StoreResult<Vec<Member>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT id, trip_id, name, email, role FROM member
                 WHERE trip_id = :trip_id AND removed_at IS NULL
                 ORDER BY id",
            )?;

            let member_iter = stmt.query_map(params![&trip_id], |row| {
                Ok(MemberRow {
                    id: row.get(0)?,
                    trip_id: row.get(1)?,
                    name: row.get(2)?,
                    email: row.get(3)?,
                    role: row.get(4)?,
                })
            })?;

            let rows: Result<Vec<_>, _> = member_iter.collect();
            rows?.into_iter().map(parse_member_row).collect::<anyhow::Result<Vec<_>>>()
        };

        fn_impl().map_err(|e| map_error("cannot get members", e))
    }

    fn insert_expense(
        &mut self,
        trip_id: TripId,
        expense: &NewExpense,
        splits: &[NewSplit],
        created_at: DateTime<Utc>,
    ) -> StoreResult<SavedExpense> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            SqliteLedgerStore::trip_exists(&tx, trip_id)?;

            let expense_id: i64 = {
                let mut insert_expense_stmt = tx.prepare_cached(
                    "INSERT INTO expense
                       (trip_id, title, amount, currency, paid_by, is_settlement, split_policy, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) RETURNING id",
                )?;

                insert_expense_stmt.query_row(
                    params![
                        &trip_id,
                        &expense.title,
                        &to_cents(expense.amount)?,
                        &expense.currency,
                        &expense.paid_by,
                        &expense.is_settlement,
                        &expense.policy.as_str(),
                        &created_at,
                    ],
                    |row| row.get(0),
                )?
            };

            debug!("expense_id is {expense_id}");

            insert_splits(&tx, expense_id, splits)?;

            tx.commit()?;

            Ok(SavedExpense {
                id: expense_id,
                trip_id,
                title: expense.title.clone(),
                amount: expense.amount,
                currency: expense.currency.clone(),
                paid_by: expense.paid_by,
                is_settlement: expense.is_settlement,
                policy: expense.policy,
                created_at,
                splits: splits
                    .iter()
                    .map(|s| SavedSplit::new(s.member_id, s.amount, s.paid))
                    .collect(),
            })
        };

        fn_impl().map_err(|e| map_error("cannot save expense", e))
    }

    fn replace_splits(
        &mut self,
        expense_id: ExpenseId,
        policy: SplitPolicyKind,
        splits: &[NewSplit],
    ) -> StoreResult<()> {
        let mut fn_impl = || {
            let tx = self.connection.transaction()?;

            let updated = tx.execute(
                "UPDATE expense SET split_policy = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![&policy.as_str(), &expense_id],
            )?;
            if updated == 0 {
                return Err(StoreError::ExpenseNotFound(expense_id).into());
            }

            tx.execute(
                "DELETE FROM expense_split WHERE expense_id = ?1",
                params![&expense_id],
            )?;

            insert_splits(&tx, expense_id, splits)?;

            tx.commit()?;

            Ok(())
        };

        fn_impl().map_err(|e| map_error("cannot replace splits", e))
    }

    fn delete_expense(&mut self, trip_id: TripId, expense_id: ExpenseId) -> StoreResult<()> {
        debug!("Deleting expense. Trip ID: {trip_id}. Expense ID: {expense_id}");
        let fn_impl = || {
            let deleted = self.connection.execute(
                "UPDATE expense SET deleted_at = CURRENT_TIMESTAMP
                 WHERE trip_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                params![&trip_id, &expense_id],
            )?;
            if deleted == 0 {
                return Err(StoreError::ExpenseNotFound(expense_id).into());
            }
            Ok(())
        };

        fn_impl().map_err(|e| map_error("cannot delete expense", e))
    }

    fn expenses_by_trip(&self, trip_id: TripId) -> StoreResult<Vec<SavedExpense>> {
        let fn_impl = || {
            let mut stmt = self.connection.prepare_cached(
                "SELECT e.id, e.title, e.amount, e.currency, e.paid_by, e.is_settlement,
                        e.split_policy, e.created_at, s.member_id, s.amount, s.paid
                 FROM expense e
                 INNER JOIN expense_split s ON e.id = s.expense_id
                 WHERE e.trip_id = :trip_id AND e.deleted_at IS NULL",
            )?;

            let expense_iter = stmt.query_map(params![&trip_id], |row| {
                Ok(ActiveExpenseRow {
                    id: row.get(0)?,
                    e_title: row.get(1)?,
                    e_amount: row.get(2)?,
                    e_currency: row.get(3)?,
                    e_paid_by: row.get(4)?,
                    e_is_settlement: row.get(5)?,
                    e_policy: row.get(6)?,
                    e_created_at: row.get(7)?,
                    s_member_id: row.get(8)?,
                    s_amount: row.get(9)?,
                    s_paid: row.get(10)?,
                })
            })?;

            let rows: Result<Vec<_>, _> = expense_iter.collect();
            parse_active_expense_rows(trip_id, rows?)
        };

        fn_impl().map_err(|e| map_error("cannot get expenses", e))
    }
}

fn insert_splits(
    tx: &rusqlite::Transaction,
    expense_id: ExpenseId,
    splits: &[NewSplit],
) -> anyhow::Result<()> {
    let mut insert_split_stmt = tx.prepare_cached(
        "INSERT INTO expense_split (expense_id, member_id, amount, paid) VALUES (?1, ?2, ?3, ?4)",
    )?;

    for split in splits {
        insert_split_stmt.execute(params![
            &expense_id,
            &split.member_id,
            &to_cents(split.amount)?,
            &split.paid,
        ])?;
    }

    Ok(())
}

/// Group the join rows back into expenses with their splits embedded.
fn parse_active_expense_rows(
    trip_id: TripId,
    rows: Vec<ActiveExpenseRow>,
) -> anyhow::Result<Vec<SavedExpense>> {
    let mut result: HashMap<ExpenseId, SavedExpense> = HashMap::new();
    for row in rows {
        let policy = SplitPolicyKind::parse(&row.e_policy).ok_or_else(|| {
            StoreError::corrupted(format!(
                "unknown split policy `{}` on expense {}",
                row.e_policy, row.id
            ))
        })?;

        let entry = result.entry(row.id).or_insert_with(|| SavedExpense {
            id: row.id,
            trip_id,
            title: row.e_title.clone(),
            amount: from_cents(row.e_amount),
            currency: row.e_currency.clone(),
            paid_by: row.e_paid_by,
            is_settlement: row.e_is_settlement,
            policy,
            created_at: row.e_created_at,
            splits: vec![],
        });

        entry
            .splits
            .push(SavedSplit::new(row.s_member_id, from_cents(row.s_amount), row.s_paid));
    }

    let mut expenses: Vec<_> = result.into_values().collect();
    expenses.sort_by_key(|e| (e.created_at, e.id));
    Ok(expenses)
}

fn parse_member_row(row: MemberRow) -> anyhow::Result<Member> {
    let role = Role::parse(&row.role)
        .ok_or_else(|| StoreError::corrupted(format!("unknown role `{}` on member {}", row.role, row.id)))?;
    Ok(Member {
        id: row.id,
        trip_id: row.trip_id,
        name: row.name,
        email: row.email,
        role,
    })
}

/// Amounts are persisted as integer minor units; `Decimal` only exists
/// on the application side of this boundary.
fn to_cents(amount: Decimal) -> anyhow::Result<i64> {
    let cents = amount * Decimal::ONE_HUNDRED;
    if cents.fract() != Decimal::ZERO {
        return Err(StoreError::corrupted(format!("amount {amount} is finer than cent precision")).into());
    }
    cents
        .to_i64()
        .ok_or_else(|| anyhow!("amount {amount} does not fit the cent representation"))
}

fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

struct ActiveExpenseRow {
    id: ExpenseId,
    e_title: String,
    e_amount: i64,
    e_currency: String,
    e_paid_by: MemberId,
    e_is_settlement: bool,
    e_policy: String,
    e_created_at: DateTime<Utc>,
    s_member_id: MemberId,
    s_amount: i64,
    s_paid: bool,
}

struct MemberRow {
    id: MemberId,
    trip_id: TripId,
    name: String,
    email: String,
    role: String,
}

fn constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

fn map_error<T: AsRef<str>>(message: T, e: anyhow::Error) -> StoreError {
    match e.downcast::<StoreError>() {
        Ok(e) => e,
        Err(e) => StoreError::unavailable(message, e),
    }
}
