//! The facade UI layers talk to.
//!
//! [Ledger] owns the single database connection for the process and
//! composes the user, session, category, expense, budget and report
//! modules into the operations a screen actually calls. Construct one at
//! process start and hand it (or clones of it) to every collaborator.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::Connection;

use crate::{
    Error,
    budget::{self, Budget},
    category, db,
    expense::{self, Expense, ExpenseId, NewExpense},
    report::{self, BudgetCheck, BudgetStatus, CategorySpend},
    session::{self, Session},
    user::{self, User, Username},
};

/// The note stored when an expense is added without one.
const DEFAULT_NOTE: &str = "No note";

/// The date stored when an expense is added without one.
const DEFAULT_DATE: &str = "Today";

/// The ledger and budget engine, wrapped around one database connection.
///
/// Cloning is cheap and clones share the same connection, so every
/// collaborator sees the same state.
#[derive(Debug, Clone)]
pub struct Ledger {
    connection: Arc<Mutex<Connection>>,
}

impl Ledger {
    /// Create a ledger over an existing connection.
    ///
    /// This function will initialize the database schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(connection: Connection) -> Result<Self, Error> {
        db::initialize(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Open (or create) the database at `path` and wrap it in a ledger.
    ///
    /// An unreadable database file is deleted and recreated once before
    /// giving up, see [open](crate::open).
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let connection = db::open(path)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Lock the shared connection.
    ///
    /// # Panics
    /// Panics if the lock is poisoned, which only happens after a panic on
    /// another thread.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap()
    }

    fn require_session(connection: &Connection) -> Result<Session, Error> {
        session::current_session(connection)?.ok_or(Error::NotLoggedIn)
    }

    /// Register a new user and log them in.
    ///
    /// # Errors
    /// See [Error::EmptyUsername], [Error::PasswordTooShort],
    /// [Error::EmptySecurityAnswer] and [Error::DuplicateUsername].
    pub fn sign_up(
        &self,
        username: &str,
        password: &str,
        security_answer: &str,
    ) -> Result<User, Error> {
        let connection = self.lock();

        let user = user::create_user(username, password, security_answer, &connection)?;
        session::save_session(&user, &connection)?;

        tracing::debug!("signed up user {}", user.id);

        Ok(user)
    }

    /// Verify the given credentials and log the user in.
    ///
    /// # Errors
    /// Returns [Error::InvalidCredentials] on any mismatch, without saying
    /// which field was wrong.
    pub fn log_in(&self, username: &str, password: &str) -> Result<User, Error> {
        let connection = self.lock();

        let user = user::verify_credentials(username, password, &connection)?;
        session::save_session(&user, &connection)?;

        tracing::debug!("logged in user {}", user.id);

        Ok(user)
    }

    /// Log the current user out. Logging out while logged out is a no-op.
    ///
    /// # Errors
    /// Returns an error if the session could not be cleared.
    pub fn log_out(&self) -> Result<(), Error> {
        session::clear_session(&self.lock())
    }

    /// Get the logged in user's identity, or `None` when logged out.
    ///
    /// A session pointing at a user that no longer exists (for example
    /// after [reset_all_data](Ledger::reset_all_data)) is cleared and
    /// reported as `None`.
    ///
    /// # Errors
    /// Returns an error if the session state could not be read.
    pub fn current_user(&self) -> Result<Option<Session>, Error> {
        session::current_session(&self.lock())
    }

    /// Change the logged in user's username and refresh the session copy.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session,
    /// [Error::EmptyUsername] or [Error::DuplicateUsername] on bad input.
    pub fn update_username(&self, new_username: &str) -> Result<Username, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        let username = user::update_username(session.user_id, new_username, &connection)?;
        session::save_session(
            &User {
                id: session.user_id,
                username: username.clone(),
            },
            &connection,
        )?;

        Ok(username)
    }

    /// Change the logged in user's password.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session,
    /// [Error::IncorrectPassword] when the current password does not match,
    /// or [Error::PasswordTooShort] for a bad new password.
    pub fn update_password(&self, current_password: &str, new_password: &str) -> Result<(), Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        user::update_password(session.user_id, current_password, new_password, &connection)
    }

    /// Overwrite a forgotten password using the security answer.
    ///
    /// Works while logged out; does not change who is logged in.
    ///
    /// # Errors
    /// Returns [Error::NotFound] unless the (username, security answer)
    /// pair matches a user, or [Error::PasswordTooShort] for a bad new
    /// password.
    pub fn reset_password(
        &self,
        username: &str,
        security_answer: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        user::reset_password(username, security_answer, new_password, &self.lock())
    }

    /// Record an expense for the logged in user.
    ///
    /// A blank note is stored as "No note" and a blank date as "Today".
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session or
    /// [Error::InvalidAmount] when `amount` is not greater than zero.
    pub fn add_expense(
        &self,
        category: &str,
        amount: f64,
        note: &str,
        date: &str,
        image_ref: Option<&str>,
    ) -> Result<Expense, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        expense::create_expense(
            session.user_id,
            new_expense(category, amount, note, date, image_ref)?,
            &connection,
        )
    }

    /// List the logged in user's expenses, most recently added first.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn expenses(&self) -> Result<Vec<Expense>, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        expense::get_expenses(session.user_id, &connection)
    }

    /// Replace the mutable fields of an existing expense.
    ///
    /// The same blank-note and blank-date defaults as
    /// [add_expense](Ledger::add_expense) apply.
    ///
    /// # Errors
    /// Returns [Error::UpdateMissingExpense] when no expense has
    /// `expense_id`, or [Error::InvalidAmount] for a bad amount.
    pub fn update_expense(
        &self,
        expense_id: ExpenseId,
        category: &str,
        amount: f64,
        note: &str,
        date: &str,
        image_ref: Option<&str>,
    ) -> Result<(), Error> {
        expense::update_expense(
            expense_id,
            new_expense(category, amount, note, date, image_ref)?,
            &self.lock(),
        )
    }

    /// Delete an expense by ID.
    ///
    /// # Errors
    /// Returns [Error::DeleteMissingExpense] when no expense has
    /// `expense_id`.
    pub fn delete_expense(&self, expense_id: ExpenseId) -> Result<(), Error> {
        expense::delete_expense(expense_id, &self.lock())
    }

    /// Delete all of the logged in user's expenses and return how many were
    /// removed. Succeeds even when there were none.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn clear_expenses(&self) -> Result<usize, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        expense::clear_expenses(session.user_id, &connection)
    }

    /// Set (or replace) the logged in user's budget for a category.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session or
    /// [Error::InvalidLimit] when `limit` is not greater than zero.
    pub fn set_budget(&self, category: &str, limit: f64) -> Result<Budget, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        if !limit.is_finite() || limit <= 0.0 {
            return Err(Error::InvalidLimit);
        }

        budget::set_budget(session.user_id, category, limit, &connection)
    }

    /// List the logged in user's budgets.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn budgets(&self) -> Result<Vec<Budget>, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        budget::get_budgets(session.user_id, &connection)
    }

    /// Remove the logged in user's budget for a category.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session or
    /// [Error::DeleteMissingBudget] when no such budget exists.
    pub fn delete_budget(&self, category: &str) -> Result<(), Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        budget::delete_budget(session.user_id, category, &connection)
    }

    /// Check whether adding an expense of `amount` would reach the
    /// category's budget limit. See [BudgetCheck].
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn check_budget(&self, category: &str, amount: f64) -> Result<BudgetCheck, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        report::check_budget(session.user_id, category, amount, &connection)
    }

    /// Check whether changing an existing expense to `new_amount` would
    /// reach the category's budget limit, without double counting the
    /// expense being edited.
    ///
    /// Use this instead of [check_budget](Ledger::check_budget) whenever an
    /// existing expense's amount or category is being changed. When neither
    /// changed, the check can be skipped.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn check_budget_on_update(
        &self,
        category: &str,
        new_amount: f64,
        expense_id: ExpenseId,
    ) -> Result<BudgetCheck, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        report::check_budget_on_update(
            session.user_id,
            category,
            new_amount,
            expense_id,
            &connection,
        )
    }

    /// Get the category list in display order.
    ///
    /// Never fails: while logged out, or when the stored list cannot be
    /// read, the seed list is returned.
    pub fn categories(&self) -> Vec<String> {
        let connection = self.lock();

        match session::current_session(&connection) {
            Ok(Some(session)) => category::get_categories(session.user_id, &connection),
            Ok(None) => category::default_list(),
            Err(error) => {
                tracing::error!("could not resolve the session for the category list: {error}");
                category::default_list()
            }
        }
    }

    /// Add a custom category for the logged in user.
    ///
    /// Returns `false` when the name is already in the list. New names are
    /// inserted just before "Others" so the fallback bucket stays last.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session or
    /// [Error::EmptyCategoryName] for a blank name.
    pub fn add_category(&self, name: &str) -> Result<bool, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyCategoryName);
        }

        category::add_category(session.user_id, name, &connection)
    }

    /// Sum the logged in user's spend across all categories.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn total_spent(&self) -> Result<f64, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        report::total_spent(session.user_id, &connection)
    }

    /// Break the logged in user's spend down by category, largest first.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn spending_by_category(&self) -> Result<Vec<CategorySpend>, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        report::spending_by_category(session.user_id, &connection)
    }

    /// Pair each of the logged in user's budgets with its current spend.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] without a session.
    pub fn budget_statuses(&self) -> Result<Vec<BudgetStatus>, Error> {
        let connection = self.lock();
        let session = Self::require_session(&connection)?;

        report::budget_statuses(session.user_id, &connection)
    }

    /// Destroy everything: all users, expenses, budgets, category lists and
    /// the session. The ledger stays usable with an empty database.
    ///
    /// # Errors
    /// Returns an error if the wipe could not be completed.
    pub fn reset_all_data(&self) -> Result<(), Error> {
        tracing::warn!("wiping all application data");

        db::reset(&self.lock())
    }
}

/// Validate and normalize the caller-supplied expense fields.
fn new_expense(
    category: &str,
    amount: f64,
    note: &str,
    date: &str,
    image_ref: Option<&str>,
) -> Result<NewExpense, Error> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount);
    }

    let note = note.trim();
    let date = date.trim();

    Ok(NewExpense {
        category: category.to_string(),
        amount,
        note: if note.is_empty() { DEFAULT_NOTE } else { note }.to_string(),
        date: if date.is_empty() { DEFAULT_DATE } else { date }.to_string(),
        image_ref: image_ref.map(|r| r.to_string()),
    })
}
