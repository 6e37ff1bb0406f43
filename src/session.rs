//! The durable "currently logged in user" state.
//!
//! At most one session exists at a time. It is written on login/signup,
//! removed on logout, and clears itself when it points at a user that no
//! longer exists (for example after the database has been reset).

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error, kv,
    user::{User, UserID, Username, user_exists},
};

const USER_ID_KEY: &str = "user_id";
const USERNAME_KEY: &str = "username";

/// The identity of the currently logged in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The logged in user's ID.
    pub user_id: UserID,
    /// The logged in user's name at the time the session was written.
    pub username: Username,
}

/// Record `user` as the currently logged in user.
pub(crate) fn save_session(user: &User, connection: &Connection) -> Result<(), Error> {
    kv::set_value(USER_ID_KEY, &user.id.as_i64().to_string(), connection)?;
    kv::set_value(USERNAME_KEY, user.username.as_ref(), connection)?;

    Ok(())
}

/// Forget the currently logged in user, if any.
pub(crate) fn clear_session(connection: &Connection) -> Result<(), Error> {
    kv::remove_value(USER_ID_KEY, connection)?;
    kv::remove_value(USERNAME_KEY, connection)?;

    Ok(())
}

/// Get the current session, or `None` when logged out.
///
/// The referenced user is re-checked against the user table on every call.
/// A session pointing at a missing user is cleared and reported as `None`,
/// so a stale session can never leak into the stores.
pub(crate) fn current_session(connection: &Connection) -> Result<Option<Session>, Error> {
    let raw_user_id = kv::get_value(USER_ID_KEY, connection)?;
    let username = kv::get_value(USERNAME_KEY, connection)?;

    let (raw_user_id, username) = match (raw_user_id, username) {
        (Some(id), Some(name)) => (id, name),
        _ => return Ok(None),
    };

    let user_id = match raw_user_id.parse::<i64>() {
        Ok(id) if id > 0 => UserID::new(id),
        _ => {
            tracing::warn!("stored session has an unusable user ID, logging out");
            clear_session(connection)?;
            return Ok(None);
        }
    };

    if !user_exists(user_id, connection)? {
        tracing::warn!("session user {user_id} is no longer in the database, logging out");
        clear_session(connection)?;
        return Ok(None);
    }

    Ok(Some(Session {
        user_id,
        username: Username::new_unchecked(&username),
    }))
}
