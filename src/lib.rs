//! Outlay is the ledger and budget engine of a single-user personal expense
//! tracker.
//!
//! This library owns the durable state (users, expenses, budgets, the
//! category list and the login session) and the budget-threshold rules.
//! UI layers are expected to drive it exclusively through the [Ledger]
//! facade.

#![warn(missing_docs)]

mod budget;
mod category;
mod db;
mod expense;
mod hash;
mod kv;
mod ledger;
mod report;
mod session;
mod user;

pub use budget::Budget;
pub use category::DEFAULT_CATEGORIES;
pub use db::{initialize, open};
pub use expense::{Expense, ExpenseId};
pub use hash::CredentialHash;
pub use ledger::Ledger;
pub use report::{BudgetCheck, BudgetStatus, CategorySpend};
pub use session::Session;
pub use user::{User, UserID, Username, get_user_by_id, user_exists};

/// The errors that may occur in the ledger engine.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An empty or whitespace-only string was used as a username.
    #[error("username cannot be empty")]
    EmptyUsername,

    /// The password did not meet the minimum length.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    /// An empty or whitespace-only string was used as a security answer.
    #[error("security answer cannot be empty")]
    EmptySecurityAnswer,

    /// An empty or whitespace-only string was used as a category name.
    #[error("category name cannot be empty")]
    EmptyCategoryName,

    /// An expense amount was zero or negative.
    #[error("expense amount must be greater than zero")]
    InvalidAmount,

    /// A budget limit was zero or negative.
    #[error("budget limit must be greater than zero")]
    InvalidLimit,

    /// The username already belongs to another user.
    #[error("the username is already taken")]
    DuplicateUsername,

    /// The username/password combination did not match a user.
    ///
    /// Deliberately does not say which of the two was wrong.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The current password given for a password change did not match the
    /// stored one.
    #[error("the current password is incorrect")]
    IncorrectPassword,

    /// An operation that needs a logged-in user was called without one.
    #[error("no user is logged in")]
    NotLoggedIn,

    /// The requested row could not be found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Tried to update an expense that does not exist.
    #[error("tried to update an expense that is not in the database")]
    UpdateMissingExpense,

    /// Tried to delete an expense that does not exist.
    #[error("tried to delete an expense that is not in the database")]
    DeleteMissingExpense,

    /// Tried to delete a budget that does not exist.
    #[error("tried to delete a budget that is not in the database")]
    DeleteMissingBudget,

    /// An error occurred while serializing a value as JSON.
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

/// The minimum accepted password length for signup and password changes.
pub const MIN_PASSWORD_LENGTH: usize = 3;

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("user.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}
