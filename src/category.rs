//! The per-user ordered list of expense categories.
//!
//! Every user starts from the same seed list. Custom categories are
//! appended once and slot in just before the "Others" fallback bucket so
//! that "Others" stays last. The list is persisted as a JSON array in the
//! preference table, one entry per user.

use rusqlite::Connection;

use crate::{Error, kv, user::UserID};

/// The seed categories every user starts with.
pub const DEFAULT_CATEGORIES: [&str; 6] = [
    "Food",
    "Transport",
    "Shopping",
    "Bills",
    "Entertainment",
    "Others",
];

/// The fallback bucket that always stays at the end of the list.
const FALLBACK_CATEGORY: &str = "Others";

fn categories_key(user_id: UserID) -> String {
    format!("categories_{user_id}")
}

/// The seed list as owned strings, for callers with no persisted list.
pub(crate) fn default_list() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
}

/// Get the user's category list, in display order.
///
/// Never fails: if no custom list has been persisted yet, or the persisted
/// value cannot be read or parsed, the seed list is returned instead.
pub(crate) fn get_categories(user_id: UserID, connection: &Connection) -> Vec<String> {
    let stored = match kv::get_value(&categories_key(user_id), connection) {
        Ok(value) => value,
        Err(error) => {
            tracing::error!("could not read the category list for user {user_id}: {error}");
            return default_list();
        }
    };

    let Some(json) = stored else {
        return default_list();
    };

    match serde_json::from_str(&json) {
        Ok(categories) => categories,
        Err(error) => {
            tracing::error!("stored category list for user {user_id} is unparsable: {error}");
            default_list()
        }
    }
}

/// Add a custom category to the user's list.
///
/// Returns `false` without changing anything if the exact name is already
/// present. New names are inserted immediately before "Others" when that
/// bucket exists, otherwise appended at the end.
///
/// # Errors
///
/// This function will return an error if the updated list could not be
/// serialized or persisted.
pub(crate) fn add_category(
    user_id: UserID,
    name: &str,
    connection: &Connection,
) -> Result<bool, Error> {
    let mut categories = get_categories(user_id, connection);

    if categories.iter().any(|existing| existing == name) {
        return Ok(false);
    }

    match categories.iter().position(|c| c == FALLBACK_CATEGORY) {
        Some(others_index) => categories.insert(others_index, name.to_string()),
        None => categories.push(name.to_string()),
    }

    save_categories(user_id, &categories, connection)?;

    Ok(true)
}

fn save_categories(
    user_id: UserID,
    categories: &[String],
    connection: &Connection,
) -> Result<(), Error> {
    let json = serde_json::to_string(categories)
        .map_err(|error| Error::JSONSerializationError(error.to_string()))?;

    kv::set_value(&categories_key(user_id), &json, connection)
}

#[cfg(test)]
mod category_tests {
    use rusqlite::Connection;

    use crate::{kv, user::UserID};

    use super::{DEFAULT_CATEGORIES, add_category, get_categories};

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        kv::create_preference_table(&connection).expect("Could not create preference table");
        connection
    }

    #[test]
    fn get_categories_returns_seed_list_when_nothing_persisted() {
        let connection = get_test_db_connection();

        let categories = get_categories(UserID::new(1), &connection);

        assert_eq!(categories, DEFAULT_CATEGORIES.to_vec());
    }

    #[test]
    fn get_categories_returns_seed_list_on_unparsable_data() {
        let connection = get_test_db_connection();
        kv::set_value("categories_1", "not json at all", &connection).unwrap();

        let categories = get_categories(UserID::new(1), &connection);

        assert_eq!(categories, DEFAULT_CATEGORIES.to_vec());
    }

    #[test]
    fn add_category_inserts_before_others() {
        let connection = get_test_db_connection();
        let user_id = UserID::new(1);

        let added = add_category(user_id, "Travel", &connection).unwrap();

        assert!(added);
        let categories = get_categories(user_id, &connection);
        assert_eq!(
            categories,
            vec![
                "Food",
                "Transport",
                "Shopping",
                "Bills",
                "Entertainment",
                "Travel",
                "Others"
            ]
        );
    }

    #[test]
    fn add_category_appends_when_others_is_absent() {
        let connection = get_test_db_connection();
        let user_id = UserID::new(1);
        kv::set_value("categories_1", r#"["Food","Rent"]"#, &connection).unwrap();

        add_category(user_id, "Travel", &connection).unwrap();

        let categories = get_categories(user_id, &connection);
        assert_eq!(categories, vec!["Food", "Rent", "Travel"]);
    }

    #[test]
    fn add_category_rejects_duplicates() {
        let connection = get_test_db_connection();
        let user_id = UserID::new(1);

        let added = add_category(user_id, "Food", &connection).unwrap();

        assert!(!added);
        assert_eq!(
            get_categories(user_id, &connection),
            DEFAULT_CATEGORIES.to_vec()
        );
    }

    #[test]
    fn category_lists_are_per_user() {
        let connection = get_test_db_connection();

        add_category(UserID::new(1), "Travel", &connection).unwrap();

        let other_users_categories = get_categories(UserID::new(2), &connection);
        assert_eq!(other_users_categories, DEFAULT_CATEGORIES.to_vec());
    }
}
