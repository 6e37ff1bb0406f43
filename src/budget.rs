//! Database operations for per-category budget limits.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, user::UserID};

/// A spending ceiling for one category, keyed by (user, category).
///
/// Budgets warn, they do not block: the engine reports when a candidate
/// amount would reach the limit and leaves the decision to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// The owning user.
    pub user_id: UserID,
    /// The category the limit applies to.
    pub category: String,
    /// The spending ceiling for the category.
    pub limit: f64,
}

/// Create the budget table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub(crate) fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                limit_amount REAL NOT NULL,
                PRIMARY KEY(user_id, category),
                FOREIGN KEY(user_id) REFERENCES user(id)
                )",
        (),
    )?;

    Ok(())
}

/// Set the budget limit for a category, replacing any existing limit.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn set_budget(
    user_id: UserID,
    category: &str,
    limit: f64,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection.execute(
        "INSERT OR REPLACE INTO budget (user_id, category, limit_amount) VALUES (?1, ?2, ?3)",
        (user_id.as_i64(), category, limit),
    )?;

    Ok(Budget {
        user_id,
        category: category.to_string(),
        limit,
    })
}

/// Retrieve all of a user's budgets. No particular order is guaranteed.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn get_budgets(user_id: UserID, connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(
            "SELECT user_id, category, limit_amount FROM budget WHERE user_id = :user_id",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_budget| maybe_budget.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the budget for one category, or `None` when no limit is set.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn get_budget(
    user_id: UserID,
    category: &str,
    connection: &Connection,
) -> Result<Option<Budget>, Error> {
    let result = connection
        .prepare(
            "SELECT user_id, category, limit_amount FROM budget
                WHERE user_id = ?1 AND category = ?2",
        )?
        .query_row((user_id.as_i64(), category), map_row);

    match result {
        Ok(budget) => Ok(Some(budget)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Delete the budget for one category.
///
/// # Errors
///
/// Returns [Error::DeleteMissingBudget] if the user has no budget for
/// `category`, or [Error::SqlError] if an SQL related error occurred.
pub(crate) fn delete_budget(
    user_id: UserID,
    category: &str,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM budget WHERE user_id = ?1 AND category = ?2",
        (user_id.as_i64(), category),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingBudget);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        user_id: UserID::new(row.get(0)?),
        category: row.get(1)?,
        limit: row.get(2)?,
    })
}
