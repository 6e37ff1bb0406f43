//! Database operations for expense records.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, user::UserID};

/// Database identifier for an expense.
pub type ExpenseId = i64;

/// A single spending record owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// The expense's ID in the application database.
    pub id: ExpenseId,
    /// The owning user.
    pub user_id: UserID,
    /// The category label the expense is grouped under.
    pub category: String,
    /// The amount spent.
    pub amount: f64,
    /// A free-text note. Blank notes are stored as "No note" by the facade.
    pub note: String,
    /// A free-text date. Dates carry no ordering guarantees.
    pub date: String,
    /// An opaque reference to an attached receipt image, if any.
    pub image_ref: Option<String>,
}

/// The mutable fields of an expense, used for both insert and full-replace
/// update.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    /// The category label the expense is grouped under.
    pub category: String,
    /// The amount spent.
    pub amount: f64,
    /// A free-text note.
    pub note: String,
    /// A free-text date.
    pub date: String,
    /// An opaque reference to an attached receipt image, if any.
    pub image_ref: Option<String>,
}

/// Create the expense table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub(crate) fn create_expense_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS expense (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                note TEXT,
                date TEXT,
                image_ref TEXT,
                FOREIGN KEY(user_id) REFERENCES user(id)
                )",
        (),
    )?;

    Ok(())
}

/// Insert an expense for `user_id` and return it with its generated ID.
///
/// The amount is stored as given. Callers are expected to have validated it
/// already; the [Ledger](crate::Ledger) facade does.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn create_expense(
    user_id: UserID,
    new_expense: NewExpense,
    connection: &Connection,
) -> Result<Expense, Error> {
    connection.execute(
        "INSERT INTO expense (user_id, category, amount, note, date, image_ref)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            user_id.as_i64(),
            &new_expense.category,
            new_expense.amount,
            &new_expense.note,
            &new_expense.date,
            &new_expense.image_ref,
        ),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Expense {
        id,
        user_id,
        category: new_expense.category,
        amount: new_expense.amount,
        note: new_expense.note,
        date: new_expense.date,
        image_ref: new_expense.image_ref,
    })
}

/// Retrieve all of a user's expenses, most recently added first.
///
/// Ordering is by descending insertion ID, not by the free-text date field.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn get_expenses(user_id: UserID, connection: &Connection) -> Result<Vec<Expense>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, category, amount, note, date, image_ref FROM expense
                WHERE user_id = :user_id
                ORDER BY id DESC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_expense| maybe_expense.map_err(|error| error.into()))
        .collect()
}

/// Replace every mutable field of an expense. The ID and owner are fixed at
/// insert time.
///
/// # Errors
///
/// Returns [Error::UpdateMissingExpense] if no expense has `expense_id`, or
/// [Error::SqlError] if an SQL related error occurred.
pub(crate) fn update_expense(
    expense_id: ExpenseId,
    new_expense: NewExpense,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE expense SET category = ?1, amount = ?2, note = ?3, date = ?4, image_ref = ?5
            WHERE id = ?6",
        (
            &new_expense.category,
            new_expense.amount,
            &new_expense.note,
            &new_expense.date,
            &new_expense.image_ref,
            expense_id,
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingExpense);
    }

    Ok(())
}

/// Delete an expense by ID.
///
/// # Errors
///
/// Returns [Error::DeleteMissingExpense] if no expense has `expense_id`, or
/// [Error::SqlError] if an SQL related error occurred.
pub(crate) fn delete_expense(expense_id: ExpenseId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute("DELETE FROM expense WHERE id = ?1", [expense_id])?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingExpense);
    }

    Ok(())
}

/// Delete all of a user's expenses and return how many were removed.
///
/// Clearing a user with no expenses is a successful no-op.
///
/// # Errors
///
/// Returns [Error::SqlError] if an SQL related error occurred.
pub(crate) fn clear_expenses(user_id: UserID, connection: &Connection) -> Result<usize, Error> {
    let rows_affected =
        connection.execute("DELETE FROM expense WHERE user_id = ?1", [user_id.as_i64()])?;

    Ok(rows_affected)
}

fn map_row(row: &Row) -> Result<Expense, rusqlite::Error> {
    Ok(Expense {
        id: row.get(0)?,
        user_id: UserID::new(row.get(1)?),
        category: row.get(2)?,
        amount: row.get(3)?,
        note: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        date: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        image_ref: row.get(6)?,
    })
}
