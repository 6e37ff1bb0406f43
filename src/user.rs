//! Code for creating the user table and the account operations: signup,
//! credential verification and username/password changes.

use std::fmt::Display;

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{Error, MIN_PASSWORD_LENGTH, hash::CredentialHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated, non-empty username.
///
/// Surrounding whitespace is stripped before validation and storage, so
/// `" alice "` and `"alice"` name the same account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Username(String);

impl Username {
    /// Create a username.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyUsername] if `name` is empty after trimming.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyUsername)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a username without validation.
    ///
    /// The caller should ensure that the string is trimmed and not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user of the application.
///
/// Credential digests stay in the database; this type only carries the
/// identity that UI layers are allowed to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's display name, unique across the user table.
    pub username: Username,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub(crate) fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                security_answer_hash TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Security answers are matched case-insensitively, so the digest is taken
/// over the trimmed, lowercased answer.
fn answer_digest(security_answer: &str) -> CredentialHash {
    CredentialHash::digest(&security_answer.trim().to_lowercase())
}

/// Create and insert a new user.
///
/// The username is trimmed before the uniqueness check and storage. The
/// security answer is trimmed and lowercased before hashing.
///
/// # Errors
///
/// This function will return an error if:
/// - the username is empty after trimming ([Error::EmptyUsername]),
/// - the password is shorter than [MIN_PASSWORD_LENGTH] ([Error::PasswordTooShort]),
/// - the security answer is empty after trimming ([Error::EmptySecurityAnswer]),
/// - the username is already taken ([Error::DuplicateUsername]),
/// - or there was an SQL related error ([Error::SqlError]).
pub(crate) fn create_user(
    username: &str,
    password: &str,
    security_answer: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let username = Username::new(username)?;

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::PasswordTooShort);
    }

    if security_answer.trim().is_empty() {
        return Err(Error::EmptySecurityAnswer);
    }

    // Checked up front to give a clear error without relying on the UNIQUE
    // constraint. The constraint still backstops a race on insert.
    let already_taken = username_taken(&username, None, connection)?;
    if already_taken {
        tracing::debug!("signup rejected: username {username} already exists");
        return Err(Error::DuplicateUsername);
    }

    connection.execute(
        "INSERT INTO user (username, password_hash, security_answer_hash) VALUES (?1, ?2, ?3)",
        (
            username.as_ref(),
            CredentialHash::digest(password).as_ref(),
            answer_digest(security_answer).as_ref(),
        ),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User { id, username })
}

/// Check the given credentials against the user table.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] when the username does not exist or
/// the password does not match. The two cases are indistinguishable on
/// purpose. Returns [Error::SqlError] if an SQL related error occurred.
pub(crate) fn verify_credentials(
    username: &str,
    password: &str,
    connection: &Connection,
) -> Result<User, Error> {
    let username = username.trim();

    let result = connection
        .prepare("SELECT id, username, password_hash FROM user WHERE username = :username")?
        .query_row(&[(":username", &username)], |row| {
            let id: i64 = row.get(0)?;
            let stored_username: String = row.get(1)?;
            let stored_hash: String = row.get(2)?;

            Ok((id, stored_username, stored_hash))
        });

    let (id, stored_username, stored_hash) = match result {
        Ok(row) => row,
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            tracing::debug!("login failed: no such user");
            return Err(Error::InvalidCredentials);
        }
        Err(error) => return Err(error.into()),
    };

    if !CredentialHash::new_unchecked(&stored_hash).matches(password) {
        tracing::debug!("login failed: password mismatch for user {id}");
        return Err(Error::InvalidCredentials);
    }

    Ok(User {
        id: UserID::new(id),
        username: Username::new_unchecked(&stored_username),
    })
}

/// Change a user's username.
///
/// Returns the trimmed username that was stored.
///
/// # Errors
///
/// This function will return an error if:
/// - the new username is empty after trimming ([Error::EmptyUsername]),
/// - another user already has the new username ([Error::DuplicateUsername]),
/// - `user_id` does not refer to a registered user ([Error::NotFound]),
/// - or there was an SQL related error ([Error::SqlError]).
pub(crate) fn update_username(
    user_id: UserID,
    new_username: &str,
    connection: &Connection,
) -> Result<Username, Error> {
    let new_username = Username::new(new_username)?;

    // The current user keeping their own name is not a collision.
    if username_taken(&new_username, Some(user_id), connection)? {
        return Err(Error::DuplicateUsername);
    }

    let rows_affected = connection.execute(
        "UPDATE user SET username = ?1 WHERE id = ?2",
        (new_username.as_ref(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(new_username)
}

/// Change a user's password after re-verifying the current one.
///
/// # Errors
///
/// This function will return an error if:
/// - the new password is shorter than [MIN_PASSWORD_LENGTH] ([Error::PasswordTooShort]),
/// - `current_password` does not match the stored digest ([Error::IncorrectPassword]),
/// - `user_id` does not refer to a registered user ([Error::NotFound]),
/// - or there was an SQL related error ([Error::SqlError]).
pub(crate) fn update_password(
    user_id: UserID,
    current_password: &str,
    new_password: &str,
    connection: &Connection,
) -> Result<(), Error> {
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::PasswordTooShort);
    }

    let stored_hash: String = connection
        .prepare("SELECT password_hash FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], |row| row.get(0))
        .map_err(Error::from)?;

    if !CredentialHash::new_unchecked(&stored_hash).matches(current_password) {
        return Err(Error::IncorrectPassword);
    }

    connection.execute(
        "UPDATE user SET password_hash = ?1 WHERE id = ?2",
        (
            CredentialHash::digest(new_password).as_ref(),
            user_id.as_i64(),
        ),
    )?;

    Ok(())
}

/// Overwrite a user's password given their username and security answer.
///
/// Does not require knowledge of the old password.
///
/// # Errors
///
/// This function will return an error if:
/// - the new password is shorter than [MIN_PASSWORD_LENGTH] ([Error::PasswordTooShort]),
/// - no user matches the (username, security answer) pair ([Error::NotFound]),
/// - or there was an SQL related error ([Error::SqlError]).
pub(crate) fn reset_password(
    username: &str,
    security_answer: &str,
    new_password: &str,
    connection: &Connection,
) -> Result<(), Error> {
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::PasswordTooShort);
    }

    let username = username.trim();

    let user_id: i64 = connection
        .prepare("SELECT id FROM user WHERE username = :username AND security_answer_hash = :answer_hash")?
        .query_row(
            &[
                (":username", &username),
                (":answer_hash", &answer_digest(security_answer).as_ref()),
            ],
            |row| row.get(0),
        )
        .map_err(Error::from)?;

    connection.execute(
        "UPDATE user SET password_hash = ?1 WHERE id = ?2",
        (CredentialHash::digest(new_password).as_ref(), user_id),
    )?;

    Ok(())
}

/// Check whether `username` is already stored, optionally ignoring one user
/// (so that renaming a user to their current name is not a collision).
fn username_taken(
    username: &Username,
    excluding: Option<UserID>,
    connection: &Connection,
) -> Result<bool, Error> {
    let taken = match excluding {
        Some(user_id) => connection
            .prepare("SELECT EXISTS (SELECT 1 FROM user WHERE username = ?1 AND id != ?2)")?
            .query_row((username.as_ref(), user_id.as_i64()), |row| row.get(0))?,
        None => connection
            .prepare("SELECT EXISTS (SELECT 1 FROM user WHERE username = ?1)")?
            .query_row([username.as_ref()], |row| row.get(0))?,
    };

    Ok(taken)
}

/// Check whether a user with the given ID exists.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn user_exists(user_id: UserID, connection: &Connection) -> Result<bool, Error> {
    connection
        .prepare("SELECT EXISTS (SELECT 1 FROM user WHERE id = :id)")?
        .query_row(&[(":id", &user_id.as_i64())], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, username FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_id = row.get(0)?;
    let raw_username: String = row.get(1)?;

    Ok(User {
        id: UserID::new(raw_id),
        username: Username::new_unchecked(&raw_username),
    })
}

#[cfg(test)]
mod username_tests {
    use crate::Error;

    use super::Username;

    #[test]
    fn new_fails_on_empty_string() {
        let username = Username::new("");

        assert_eq!(username, Err(Error::EmptyUsername));
    }

    #[test]
    fn new_fails_on_just_whitespace() {
        let username = Username::new("\n\t \r");

        assert_eq!(username, Err(Error::EmptyUsername));
    }

    #[test]
    fn new_trims_surrounding_whitespace() {
        let username = Username::new("  alice  ").unwrap();

        assert_eq!(username.as_ref(), "alice");
    }
}

#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{Error, user::user_exists};

    use super::{
        UserID, create_user, create_user_table, get_user_by_id, reset_password, update_password,
        update_username, verify_credentials,
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_user_table(&connection).expect("Could not create user table");
        connection
    }

    #[test]
    fn create_user_succeeds() {
        let connection = get_test_db_connection();

        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        assert!(user.id.as_i64() > 0);
        assert_eq!(user.username.as_ref(), "alice");
    }

    #[test]
    fn create_user_trims_username() {
        let connection = get_test_db_connection();

        let user = create_user("  alice  ", "hunter2", "rex", &connection).unwrap();

        assert_eq!(user.username.as_ref(), "alice");
    }

    #[test]
    fn create_user_fails_on_empty_username() {
        let connection = get_test_db_connection();

        let result = create_user("   ", "hunter2", "rex", &connection);

        assert_eq!(result, Err(Error::EmptyUsername));
    }

    #[test]
    fn create_user_fails_on_short_password() {
        let connection = get_test_db_connection();

        let result = create_user("alice", "no", "rex", &connection);

        assert_eq!(result, Err(Error::PasswordTooShort));
    }

    #[test]
    fn create_user_fails_on_empty_security_answer() {
        let connection = get_test_db_connection();

        let result = create_user("alice", "hunter2", " \t", &connection);

        assert_eq!(result, Err(Error::EmptySecurityAnswer));
    }

    #[test]
    fn create_user_fails_on_duplicate_username() {
        let connection = get_test_db_connection();
        create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = create_user("alice", "hunter3", "spot", &connection);

        assert_eq!(result, Err(Error::DuplicateUsername));
    }

    #[test]
    fn create_user_fails_on_duplicate_username_after_trimming() {
        let connection = get_test_db_connection();
        create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = create_user("  alice ", "hunter3", "spot", &connection);

        assert_eq!(result, Err(Error::DuplicateUsername));
    }

    #[test]
    fn verify_credentials_succeeds_after_signup() {
        let connection = get_test_db_connection();
        let created = create_user(" alice ", "hunter2", "rex", &connection).unwrap();

        let verified = verify_credentials("alice", "hunter2", &connection).unwrap();

        assert_eq!(verified, created);
    }

    #[test]
    fn verify_credentials_fails_on_wrong_password() {
        let connection = get_test_db_connection();
        create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = verify_credentials("alice", "wrong", &connection);

        assert_eq!(result, Err(Error::InvalidCredentials));
    }

    #[test]
    fn verify_credentials_fails_on_unknown_user() {
        let connection = get_test_db_connection();
        create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = verify_credentials("bob", "hunter2", &connection);

        // Must be the same error as a wrong password.
        assert_eq!(result, Err(Error::InvalidCredentials));
    }

    #[test]
    fn update_username_succeeds() {
        let connection = get_test_db_connection();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        let new_username = update_username(user.id, " alicia ", &connection).unwrap();

        assert_eq!(new_username.as_ref(), "alicia");
        let reloaded = get_user_by_id(user.id, &connection).unwrap();
        assert_eq!(reloaded.username, new_username);
    }

    #[test]
    fn update_username_fails_on_collision_with_other_user() {
        let connection = get_test_db_connection();
        create_user("alice", "hunter2", "rex", &connection).unwrap();
        let bob = create_user("bob", "hunter2", "spot", &connection).unwrap();

        let result = update_username(bob.id, "alice", &connection);

        assert_eq!(result, Err(Error::DuplicateUsername));
    }

    #[test]
    fn update_username_allows_keeping_own_name() {
        let connection = get_test_db_connection();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = update_username(user.id, "alice", &connection);

        assert!(result.is_ok());
    }

    #[test]
    fn update_username_fails_on_missing_user() {
        let connection = get_test_db_connection();

        let result = update_username(UserID::new(42), "ghost", &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn update_password_succeeds_with_correct_current_password() {
        let connection = get_test_db_connection();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        update_password(user.id, "hunter2", "hunter3", &connection).unwrap();

        assert!(verify_credentials("alice", "hunter3", &connection).is_ok());
        assert_eq!(
            verify_credentials("alice", "hunter2", &connection),
            Err(Error::InvalidCredentials)
        );
    }

    #[test]
    fn update_password_fails_with_wrong_current_password() {
        let connection = get_test_db_connection();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = update_password(user.id, "wrong", "hunter3", &connection);

        assert_eq!(result, Err(Error::IncorrectPassword));
    }

    #[test]
    fn update_password_fails_on_short_new_password() {
        let connection = get_test_db_connection();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = update_password(user.id, "hunter2", "no", &connection);

        assert_eq!(result, Err(Error::PasswordTooShort));
    }

    #[test]
    fn reset_password_succeeds_with_matching_answer() {
        let connection = get_test_db_connection();
        create_user("alice", "hunter2", "Rex", &connection).unwrap();

        // Answers are case-insensitive and trimmed.
        reset_password("alice", "  rEx ", "hunter3", &connection).unwrap();

        assert!(verify_credentials("alice", "hunter3", &connection).is_ok());
        assert_eq!(
            verify_credentials("alice", "hunter2", &connection),
            Err(Error::InvalidCredentials)
        );
    }

    #[test]
    fn reset_password_fails_with_wrong_answer() {
        let connection = get_test_db_connection();
        create_user("alice", "hunter2", "rex", &connection).unwrap();

        let result = reset_password("alice", "spot", "hunter3", &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn reset_password_fails_on_unknown_user() {
        let connection = get_test_db_connection();

        let result = reset_password("ghost", "rex", "hunter3", &connection);

        assert_eq!(result, Err(Error::NotFound));
    }

    #[test]
    fn user_exists_reflects_table_contents() {
        let connection = get_test_db_connection();
        let user = create_user("alice", "hunter2", "rex", &connection).unwrap();

        assert!(user_exists(user.id, &connection).unwrap());
        assert!(!user_exists(UserID::new(user.id.as_i64() + 1), &connection).unwrap());
    }

    #[test]
    fn get_user_by_id_fails_with_non_existent_id() {
        let connection = get_test_db_connection();

        let result = get_user_by_id(UserID::new(42), &connection);

        assert_eq!(result, Err(Error::NotFound));
    }
}
