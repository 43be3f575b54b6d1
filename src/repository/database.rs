use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::TodoError;
use crate::models::todo::{NewTodo, Todo, TodoChanges};
use crate::repository::schema::todos::dsl::*;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type DBPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
type DBConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Applied to every connection the pool opens.
#[derive(Debug)]
struct SqlitePragmas {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
            self.busy_timeout.as_millis()
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Storage handle shared by all workers. Each operation checks out its own
/// connection, which goes back to the pool when the operation returns.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DBPool,
}

impl Database {
    pub fn new(database_url: &str, pool_size: u32) -> Result<Self, TodoError> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = r2d2::Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(SqlitePragmas {
                busy_timeout: BUSY_TIMEOUT,
            }))
            .build(manager)?;
        Ok(Database { pool })
    }

    fn conn(&self) -> Result<DBConnection, TodoError> {
        Ok(self.pool.get()?)
    }

    /// Creates the `todos` table if it does not exist yet.
    pub fn run_migrations(&self) -> Result<(), TodoError> {
        let mut conn = self.conn()?;
        let conn: &mut SqliteConnection = &mut conn;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(TodoError::Migration)?;
        tracing::info!(count = applied.len(), "applied pending migrations");
        Ok(())
    }

    /// Inserts the sample rows when the table is empty and returns how many
    /// rows were written. Count and insert share one write transaction.
    pub fn seed_if_empty(&self) -> Result<usize, TodoError> {
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            let existing: i64 = todos.count().get_result(conn)?;
            if existing > 0 {
                return Ok(0);
            }
            let inserted = diesel::insert_into(todos)
                .values(&seed_todos())
                .execute(conn)?;
            Ok(inserted)
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn get_todos(&self) -> Result<Vec<Todo>, TodoError> {
        let mut conn = self.conn()?;
        let rows = todos
            .order(id.asc())
            .select(Todo::as_select())
            .load(&mut conn)?;
        Ok(rows)
    }

    #[tracing::instrument(skip(self))]
    pub fn get_todo_by_id(&self, todo_id: i64) -> Result<Todo, TodoError> {
        let mut conn = self.conn()?;
        find_todo(&mut conn, todo_id)
    }

    #[tracing::instrument(skip_all)]
    pub fn create_todo(&self, new_todo: NewTodo) -> Result<Todo, TodoError> {
        let mut conn = self.conn()?;
        let todo = diesel::insert_into(todos)
            .values(&new_todo)
            .returning(Todo::as_returning())
            .get_result(&mut conn)?;
        tracing::debug!(todo_id = todo.id, "created todo");
        Ok(todo)
    }

    /// Overwrites every mutable column of `todo_id`.
    #[tracing::instrument(skip(self, changes))]
    pub fn update_todo_by_id(
        &self,
        todo_id: i64,
        changes: TodoChanges,
    ) -> Result<Todo, TodoError> {
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            find_todo(conn, todo_id)?;
            let todo = diesel::update(todos.find(todo_id))
                .set(&changes)
                .returning(Todo::as_returning())
                .get_result(conn)?;
            Ok(todo)
        })
    }

    /// Flips `completed`. The read and the write run under one writer lock, so
    /// concurrent toggles of the same row serialize.
    #[tracing::instrument(skip(self))]
    pub fn toggle_todo_by_id(&self, todo_id: i64) -> Result<Todo, TodoError> {
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            let current = find_todo(conn, todo_id)?.completed;
            let todo = diesel::update(todos.find(todo_id))
                .set(completed.eq(!current))
                .returning(Todo::as_returning())
                .get_result(conn)?;
            Ok(todo)
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_todo_by_id(&self, todo_id: i64) -> Result<(), TodoError> {
        let mut conn = self.conn()?;
        conn.immediate_transaction(|conn| {
            find_todo(conn, todo_id)?;
            diesel::delete(todos.find(todo_id)).execute(conn)?;
            Ok(())
        })
    }
}

fn find_todo(conn: &mut SqliteConnection, todo_id: i64) -> Result<Todo, TodoError> {
    todos
        .find(todo_id)
        .select(Todo::as_select())
        .first(conn)
        .optional()?
        .ok_or(TodoError::NotFound)
}

fn seed_todos() -> Vec<NewTodo> {
    vec![
        NewTodo::new("Buy groceries", Some("Milk, Bread, Eggs".to_string())),
        NewTodo {
            completed: true,
            ..NewTodo::new("Read a book", Some("Finish reading 'Atomic Habits'".to_string()))
        },
    ]
}

#[cfg(test)]
pub mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;
    use tempfile::TempDir;

    /// A migrated, unseeded database in a fresh directory. Keep the `TempDir`
    /// alive for as long as the database is used.
    pub fn test_database() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todo.db");
        let db = Database::new(path.to_str().unwrap(), 4).unwrap();
        db.run_migrations().unwrap();
        (dir, db)
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (_dir, db) = test_database();
        assert!(db.get_todos().unwrap().is_empty());
    }

    #[test]
    fn create_assigns_fresh_ids_and_defaults() {
        let (_dir, db) = test_database();
        let first = db.create_todo(NewTodo::new("first", None)).unwrap();
        let second = db
            .create_todo(NewTodo::new("second", Some("details".to_string())))
            .unwrap();
        assert_ne!(first.id, second.id);
        assert!(!first.completed);
        assert_eq!(first.description, None);
        assert_eq!(db.get_todo_by_id(second.id).unwrap(), second);
    }

    #[test]
    fn list_is_ordered_by_id_after_deletes() {
        let (_dir, db) = test_database();
        let created: Vec<Todo> = (0..5)
            .map(|n| db.create_todo(NewTodo::new(format!("todo {n}"), None)).unwrap())
            .collect();
        db.delete_todo_by_id(created[1].id).unwrap();
        db.delete_todo_by_id(created[3].id).unwrap();

        let ids: Vec<i64> = db.get_todos().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![created[0].id, created[2].id, created[4].id]);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let (_dir, db) = test_database();
        let first = db.create_todo(NewTodo::new("first", None)).unwrap();
        db.delete_todo_by_id(first.id).unwrap();
        let second = db.create_todo(NewTodo::new("second", None)).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn update_overwrites_every_field() {
        let (_dir, db) = test_database();
        let todo = db
            .create_todo(NewTodo::new("old", Some("old description".to_string())))
            .unwrap();
        let updated = db
            .update_todo_by_id(
                todo.id,
                TodoChanges {
                    title: "new".to_string(),
                    description: None,
                    completed: true,
                },
            )
            .unwrap();
        assert_eq!(updated.id, todo.id);
        assert_eq!(updated.title, "new");
        assert_eq!(updated.description, None);
        assert!(updated.completed);
        assert_eq!(db.get_todo_by_id(todo.id).unwrap(), updated);
    }

    #[test]
    fn toggle_twice_restores_completed() {
        let (_dir, db) = test_database();
        let todo = db.create_todo(NewTodo::new("flip", None)).unwrap();
        assert!(db.toggle_todo_by_id(todo.id).unwrap().completed);
        assert!(!db.toggle_todo_by_id(todo.id).unwrap().completed);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let (_dir, db) = test_database();
        let changes = TodoChanges {
            title: "x".to_string(),
            description: None,
            completed: false,
        };
        assert!(matches!(db.get_todo_by_id(999), Err(TodoError::NotFound)));
        assert!(matches!(db.update_todo_by_id(999, changes), Err(TodoError::NotFound)));
        assert!(matches!(db.toggle_todo_by_id(999), Err(TodoError::NotFound)));
        assert!(matches!(db.delete_todo_by_id(999), Err(TodoError::NotFound)));
    }

    #[test]
    fn delete_twice_reports_not_found() {
        let (_dir, db) = test_database();
        let todo = db.create_todo(NewTodo::new("gone", None)).unwrap();
        db.delete_todo_by_id(todo.id).unwrap();
        assert!(matches!(db.delete_todo_by_id(todo.id), Err(TodoError::NotFound)));
        assert!(matches!(db.get_todo_by_id(todo.id), Err(TodoError::NotFound)));
    }

    #[test]
    fn seed_runs_only_on_empty_table() {
        let (_dir, db) = test_database();
        assert_eq!(db.seed_if_empty().unwrap(), 2);
        assert_eq!(db.seed_if_empty().unwrap(), 0);

        let seeded = db.get_todos().unwrap();
        assert_eq!(seeded.len(), 2);
        assert_eq!(seeded[0].title, "Buy groceries");
        assert!(!seeded[0].completed);
        assert_eq!(seeded[1].title, "Read a book");
        assert!(seeded[1].completed);
    }

    #[test]
    fn seed_skips_table_with_user_rows() {
        let (_dir, db) = test_database();
        db.create_todo(NewTodo::new("mine", None)).unwrap();
        assert_eq!(db.seed_if_empty().unwrap(), 0);
        assert_eq!(db.get_todos().unwrap().len(), 1);
    }

    #[test]
    fn migrations_are_idempotent() {
        let (_dir, db) = test_database();
        db.create_todo(NewTodo::new("kept", None)).unwrap();
        db.run_migrations().unwrap();
        assert_eq!(db.get_todos().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_creates_get_unique_ids() {
        let (_dir, db) = test_database();
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let db = db.clone();
                thread::spawn(move || {
                    (0..5)
                        .map(|n| {
                            db.create_todo(NewTodo::new(format!("{worker}-{n}"), None))
                                .unwrap()
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<i64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(ids.len(), 20);
        assert_eq!(db.get_todos().unwrap().len(), 20);
    }

    #[test]
    fn concurrent_toggles_of_one_row_serialize() {
        let (_dir, db) = test_database();
        let todo = db.create_todo(NewTodo::new("contended", None)).unwrap();
        let todo_id = todo.id;
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                thread::spawn(move || {
                    (0..25)
                        .map(|_| db.toggle_todo_by_id(todo_id))
                        .filter(Result::is_err)
                        .count()
                })
            })
            .collect();

        let failures: usize = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .sum();
        assert_eq!(failures, 0);
        assert_eq!(db.get_todo_by_id(todo.id).unwrap().completed, todo.completed);
    }

    #[test]
    fn concurrent_seeders_seed_once() {
        let (_dir, db) = test_database();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                thread::spawn(move || db.seed_if_empty().unwrap())
            })
            .collect();

        let inserted: usize = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .sum();
        assert_eq!(inserted, 2);
        assert_eq!(db.get_todos().unwrap().len(), 2);
    }
}
