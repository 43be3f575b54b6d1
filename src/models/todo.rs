use diesel::{AsChangeset, Insertable, Queryable, Selectable};

use crate::repository::schema::todos;

/// A row of the `todos` table.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = todos)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// Column values for an insert. `id` is left to SQLite.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = todos)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// Every mutable column of a row. A `None` description is written as NULL.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = todos)]
#[diesel(treat_none_as_null = true)]
pub struct TodoChanges {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

impl NewTodo {
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
            completed: false,
        }
    }
}
