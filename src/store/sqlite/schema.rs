const CREATE_TRIP_TABLE: &str = "CREATE TABLE IF NOT EXISTS trip (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL,
  currency TEXT NOT NULL,
  created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_MEMBER_TABLE: &str = "CREATE TABLE IF NOT EXISTS member (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  trip_id INTEGER NOT NULL,
  name TEXT NOT NULL,
  email TEXT NOT NULL,
  role TEXT NOT NULL,
  created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
  removed_at DATETIME,
  UNIQUE(trip_id, email)
)";

const CREATE_EXPENSE_TABLE: &str = "CREATE TABLE IF NOT EXISTS expense (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  trip_id INTEGER NOT NULL,
  title TEXT NOT NULL,
  amount INTEGER NOT NULL,
  currency TEXT NOT NULL,
  paid_by INTEGER NOT NULL,
  is_settlement BOOL NOT NULL,
  split_policy TEXT NOT NULL,
  created_at DATETIME NOT NULL,
  deleted_at DATETIME
)";

const CREATE_EXPENSE_SPLIT_TABLE: &str = "CREATE TABLE IF NOT EXISTS expense_split (
  expense_id INTEGER NOT NULL,
  member_id INTEGER NOT NULL,
  amount INTEGER NOT NULL,
  paid BOOL NOT NULL,
  UNIQUE(expense_id, member_id)
)";

pub fn create_all_tables(connection: &rusqlite::Connection) -> anyhow::Result<()> {
    connection.execute(CREATE_TRIP_TABLE, ())?;
    connection.execute(CREATE_MEMBER_TABLE, ())?;
    connection.execute(CREATE_EXPENSE_TABLE, ())?;
    connection.execute(CREATE_EXPENSE_SPLIT_TABLE, ())?;
    Ok(())
}
