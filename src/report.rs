//! Budget-threshold checks and spending aggregations.
//!
//! Nothing in this module owns state: every function recomputes from the
//! expense and budget tables at call time. At personal-finance volumes a
//! full scan per check is cheap and keeps the results impossible to
//! invalidate.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    budget::{Budget, get_budget, get_budgets},
    expense::ExpenseId,
    user::UserID,
};

/// The outcome of asking whether a candidate expense amount would reach a
/// category's budget limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    /// Whether the new total would reach or pass the limit.
    ///
    /// The threshold is inclusive: landing exactly on the limit counts.
    pub exceeds_budget: bool,
    /// The configured limit, or 0 when no budget is set for the category.
    pub budget_limit: f64,
    /// What the user has already spent in the category.
    pub current_spent: f64,
    /// `current_spent` plus the candidate amount.
    pub new_total: f64,
}

impl BudgetCheck {
    /// The result for a category with no budget configured.
    ///
    /// All fields are zero and `exceeds_budget` is false, which callers can
    /// tell apart from a within-budget result by the zero limit.
    fn unconstrained() -> Self {
        Self {
            exceeds_budget: false,
            budget_limit: 0.0,
            current_spent: 0.0,
            new_total: 0.0,
        }
    }
}

/// One category's total spend, as used by spending breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpend {
    /// The category label.
    pub category: String,
    /// The summed amount of the user's expenses in the category.
    pub total: f64,
}

/// A configured budget paired with the category's current spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    /// The configured budget.
    pub budget: Budget,
    /// The summed amount of the user's expenses in the budget's category.
    pub spent: f64,
}

/// Check whether adding an expense of `amount` would reach the category's
/// budget limit.
///
/// With no budget configured for the category the check short-circuits to
/// the all-zero [BudgetCheck].
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn check_budget(
    user_id: UserID,
    category: &str,
    amount: f64,
    connection: &Connection,
) -> Result<BudgetCheck, Error> {
    let Some(budget) = get_budget(user_id, category, connection)? else {
        return Ok(BudgetCheck::unconstrained());
    };

    let current_spent = category_spent(user_id, category, None, connection)?;

    Ok(evaluate(budget.limit, current_spent, amount))
}

/// Check whether changing an existing expense to `new_amount` would reach
/// the category's budget limit.
///
/// The expense being edited is excluded from the current-spend sum so its
/// old amount is not double counted. Callers editing an expense must use
/// this instead of [check_budget]; when neither the amount nor the category
/// changed, the check can be skipped entirely.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn check_budget_on_update(
    user_id: UserID,
    category: &str,
    new_amount: f64,
    exclude_expense_id: ExpenseId,
    connection: &Connection,
) -> Result<BudgetCheck, Error> {
    let Some(budget) = get_budget(user_id, category, connection)? else {
        return Ok(BudgetCheck::unconstrained());
    };

    let current_spent = category_spent(user_id, category, Some(exclude_expense_id), connection)?;

    Ok(evaluate(budget.limit, current_spent, new_amount))
}

/// The single place the threshold comparison lives.
fn evaluate(budget_limit: f64, current_spent: f64, candidate_amount: f64) -> BudgetCheck {
    let new_total = current_spent + candidate_amount;

    BudgetCheck {
        exceeds_budget: new_total >= budget_limit,
        budget_limit,
        current_spent,
        new_total,
    }
}

/// Sum the user's spend in one category, optionally leaving out one expense.
fn category_spent(
    user_id: UserID,
    category: &str,
    exclude: Option<ExpenseId>,
    connection: &Connection,
) -> Result<f64, Error> {
    let total = match exclude {
        Some(expense_id) => connection
            .prepare(
                "SELECT COALESCE(SUM(amount), 0) FROM expense
                    WHERE user_id = ?1 AND category = ?2 AND id != ?3",
            )?
            .query_row((user_id.as_i64(), category, expense_id), |row| row.get(0))?,
        None => connection
            .prepare(
                "SELECT COALESCE(SUM(amount), 0) FROM expense
                    WHERE user_id = ?1 AND category = ?2",
            )?
            .query_row((user_id.as_i64(), category), |row| row.get(0))?,
    };

    Ok(total)
}

/// Sum the user's spend across all categories.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn total_spent(user_id: UserID, connection: &Connection) -> Result<f64, Error> {
    connection
        .prepare("SELECT COALESCE(SUM(amount), 0) FROM expense WHERE user_id = :user_id")?
        .query_row(&[(":user_id", &user_id.as_i64())], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Break the user's spend down by category, largest total first.
///
/// Categories with no expenses do not appear.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn spending_by_category(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<CategorySpend>, Error> {
    connection
        .prepare(
            "SELECT category, SUM(amount) AS total FROM expense
                WHERE user_id = :user_id
                GROUP BY category
                ORDER BY total DESC",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], |row| {
            Ok(CategorySpend {
                category: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .map(|maybe_spend| maybe_spend.map_err(|error| error.into()))
        .collect()
}

/// Pair each of the user's budgets with the category's current spend.
///
/// # Errors
///
/// This function will return an error if there is an SQL error.
pub(crate) fn budget_statuses(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<BudgetStatus>, Error> {
    get_budgets(user_id, connection)?
        .into_iter()
        .map(|budget| {
            let spent = category_spent(user_id, &budget.category, None, connection)?;
            Ok(BudgetStatus { budget, spent })
        })
        .collect()
}
