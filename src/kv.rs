//! A durable key-value table shared by the session and the category list.

use rusqlite::Connection;

use crate::Error;

/// Create the preference table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub(crate) fn create_preference_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS preference (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Store `value` under `key`, replacing any previous value.
pub(crate) fn set_value(key: &str, value: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT OR REPLACE INTO preference (key, value) VALUES (?1, ?2)",
        (key, value),
    )?;

    Ok(())
}

/// Retrieve the value stored under `key`, if any.
pub(crate) fn get_value(key: &str, connection: &Connection) -> Result<Option<String>, Error> {
    let result = connection
        .prepare("SELECT value FROM preference WHERE key = :key")?
        .query_row(&[(":key", key)], |row| row.get(0));

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Remove the value stored under `key`. Removing an absent key is not an
/// error.
pub(crate) fn remove_value(key: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM preference WHERE key = ?1", [key])?;

    Ok(())
}

/// Remove every stored value.
pub(crate) fn clear_values(connection: &Connection) -> Result<(), Error> {
    connection.execute("DELETE FROM preference", [])?;

    Ok(())
}

#[cfg(test)]
mod preference_tests {
    use rusqlite::Connection;

    use super::{clear_values, create_preference_table, get_value, remove_value, set_value};

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        create_preference_table(&connection).expect("Could not create preference table");
        connection
    }

    #[test]
    fn get_value_returns_none_for_missing_key() {
        let connection = get_test_db_connection();

        let value = get_value("missing", &connection).unwrap();

        assert_eq!(value, None);
    }

    #[test]
    fn set_value_then_get_value_round_trips() {
        let connection = get_test_db_connection();

        set_value("greeting", "hello", &connection).unwrap();

        let value = get_value("greeting", &connection).unwrap();
        assert_eq!(value, Some("hello".to_string()));
    }

    #[test]
    fn set_value_replaces_existing_value() {
        let connection = get_test_db_connection();

        set_value("greeting", "hello", &connection).unwrap();
        set_value("greeting", "goodbye", &connection).unwrap();

        let value = get_value("greeting", &connection).unwrap();
        assert_eq!(value, Some("goodbye".to_string()));
    }

    #[test]
    fn remove_value_deletes_key() {
        let connection = get_test_db_connection();
        set_value("greeting", "hello", &connection).unwrap();

        remove_value("greeting", &connection).unwrap();

        assert_eq!(get_value("greeting", &connection).unwrap(), None);
    }

    #[test]
    fn remove_value_succeeds_for_missing_key() {
        let connection = get_test_db_connection();

        assert!(remove_value("missing", &connection).is_ok());
    }

    #[test]
    fn clear_values_removes_everything() {
        let connection = get_test_db_connection();
        set_value("a", "1", &connection).unwrap();
        set_value("b", "2", &connection).unwrap();

        clear_values(&connection).unwrap();

        assert_eq!(get_value("a", &connection).unwrap(), None);
        assert_eq!(get_value("b", &connection).unwrap(), None);
    }
}
