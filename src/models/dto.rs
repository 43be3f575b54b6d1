use serde::{Deserialize, Serialize};

use crate::models::todo::{NewTodo, Todo, TodoChanges};

/// Body of `POST /todos`. An empty description is stored as NULL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodoDto {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of `PUT /todos/{id}`. Every field is written; `completed` has no default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceTodoDto {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoDto {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

impl From<CreateTodoDto> for NewTodo {
    fn from(value: CreateTodoDto) -> Self {
        NewTodo::new(
            value.title,
            value.description.filter(|description| !description.is_empty()),
        )
    }
}

impl From<ReplaceTodoDto> for TodoChanges {
    fn from(value: ReplaceTodoDto) -> Self {
        Self {
            title: value.title,
            description: value.description,
            completed: value.completed,
        }
    }
}

impl From<Todo> for TodoDto {
    fn from(value: Todo) -> Self {
        Self {
            id: value.id,
            title: value.title,
            description: value.description,
            completed: value.completed,
        }
    }
}
