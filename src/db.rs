//! Schema creation, versioning and recovery for the application database.
//!
//! Schema changes are destructive by design: when the stored version does
//! not match [SCHEMA_VERSION], the data tables are dropped and recreated
//! and all rows are lost. The preference table is left alone so that
//! non-relational state survives the way it always has; a session pointing
//! at a dropped user is cleaned up by the session self-heal.

use std::path::Path;

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{Error, budget, expense, kv, user};

/// The version stamped into the database's `user_version` pragma.
///
/// Bump this whenever a data table's shape changes.
const SCHEMA_VERSION: i32 = 1;

/// Create the application tables, upgrading destructively if the database
/// was written by a different schema version.
///
/// Safe to call on every open; existing tables at the current version are
/// left untouched.
///
/// # Errors
///
/// This function will return an error if the database cannot be read or the
/// tables cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let version: i32 = connection.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    if version != 0 && version != SCHEMA_VERSION {
        tracing::warn!(
            "database has schema version {version}, expected {SCHEMA_VERSION}; \
            dropping the data tables"
        );
        drop_data_tables(&transaction)?;
    }

    user::create_user_table(&transaction)?;
    expense::create_expense_table(&transaction)?;
    budget::create_budget_table(&transaction)?;
    kv::create_preference_table(&transaction)?;

    transaction.commit()?;

    connection.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;

    Ok(())
}

/// Open (or create) the application database at `path`.
///
/// Foreign keys are switched on for the connection and the schema is
/// initialized. If the file exists but cannot be opened as a database, it
/// is deleted and recreated once; if that also fails the error is returned
/// to the caller.
///
/// # Errors
///
/// This function will return an error if the database cannot be opened or
/// initialized even after the recovery attempt.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection, Error> {
    let path = path.as_ref();

    match try_open(path) {
        Ok(connection) => Ok(connection),
        Err(error) => {
            tracing::error!(
                "could not open the database at {path:?} ({error}); \
                deleting the file and recreating it"
            );

            if let Err(remove_error) = std::fs::remove_file(path) {
                if remove_error.kind() != std::io::ErrorKind::NotFound {
                    tracing::error!("could not delete the database file: {remove_error}");
                    return Err(error);
                }
            }

            try_open(path)
        }
    }
}

fn try_open(path: &Path) -> Result<Connection, Error> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA foreign_keys = ON")?;
    initialize(&connection)?;

    Ok(connection)
}

/// Wipe everything: all preference values and all rows in the data tables.
///
/// The tables are recreated empty inside the same transaction, so the
/// connection stays usable afterwards.
pub(crate) fn reset(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    kv::clear_values(&transaction)?;
    drop_data_tables(&transaction)?;

    user::create_user_table(&transaction)?;
    expense::create_expense_table(&transaction)?;
    budget::create_budget_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

fn drop_data_tables(connection: &Connection) -> Result<(), Error> {
    connection.execute_batch(
        "DROP TABLE IF EXISTS budget;
        DROP TABLE IF EXISTS expense;
        DROP TABLE IF EXISTS user;",
    )?;

    Ok(())
}

#[cfg(test)]
mod db_tests {
    use std::fs;

    use rusqlite::Connection;

    use crate::{
        expense::{create_expense, get_expenses, test_utils::draft},
        user::{create_user, get_user_by_id},
    };

    use super::{SCHEMA_VERSION, initialize, open, reset};

    #[test]
    fn initialize_creates_all_tables() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                    AND name IN ('user', 'expense', 'budget', 'preference')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn initialize_stamps_the_schema_version() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).unwrap();

        let version: i32 = connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn initialize_is_idempotent_at_the_current_version() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        initialize(&connection).unwrap();

        assert!(get_user_by_id(user.id, &connection).is_ok());
    }

    #[test]
    fn initialize_drops_data_on_version_mismatch() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();
        create_expense(user.id, draft("Food", 1.0), &connection).unwrap();

        connection
            .execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1))
            .unwrap();
        initialize(&connection).unwrap();

        assert!(get_user_by_id(user.id, &connection).is_err());
        assert!(get_expenses(user.id, &connection).unwrap().is_empty());
    }

    #[test]
    fn open_creates_a_new_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");

        let connection = open(&db_path).unwrap();

        assert!(db_path.is_file());
        assert!(create_user("alice", "hunter2", "rex", &connection).is_ok());
    }

    #[test]
    fn open_recovers_from_a_corrupt_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("ledger.db");
        fs::write(&db_path, b"this is definitely not a SQLite database").unwrap();

        let connection = open(&db_path).unwrap();

        // The corrupt file was replaced with a working, empty database.
        assert!(create_user("alice", "hunter2", "rex", &connection).is_ok());
    }

    #[test]
    fn reset_wipes_rows_and_preferences() {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();
        create_expense(user.id, draft("Food", 1.0), &connection).unwrap();
        crate::kv::set_value("greeting", "hello", &connection).unwrap();

        reset(&connection).unwrap();

        assert!(get_user_by_id(user.id, &connection).is_err());
        assert!(get_expenses(user.id, &connection).unwrap().is_empty());
        assert_eq!(crate::kv::get_value("greeting", &connection).unwrap(), None);
    }
}
