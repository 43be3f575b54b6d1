use actix_web::{delete, get, patch, post, put, web, HttpResponse};

use crate::error::{json_error_handler, path_error_handler, TodoError};
use crate::models::dto::{CreateTodoDto, ReplaceTodoDto, TodoDto};
use crate::models::todo::{NewTodo, TodoChanges};
use crate::repository::database::Database;

const JSON_LIMIT: usize = 64 * 1024;

#[get("/todos")]
pub async fn get_todos(db: web::Data<Database>) -> Result<HttpResponse, TodoError> {
    let todos = web::block(move || db.get_todos()).await??;
    Ok(HttpResponse::Ok().json(todos.into_iter().map(TodoDto::from).collect::<Vec<_>>()))
}

#[get("/todos/{id}")]
pub async fn get_todo_by_id(
    db: web::Data<Database>,
    id: web::Path<i64>,
) -> Result<HttpResponse, TodoError> {
    let todo_id = id.into_inner();
    let todo = web::block(move || db.get_todo_by_id(todo_id)).await??;
    Ok(HttpResponse::Ok().json(TodoDto::from(todo)))
}

#[post("/todos")]
pub async fn create_todo(
    db: web::Data<Database>,
    new_todo: web::Json<CreateTodoDto>,
) -> Result<HttpResponse, TodoError> {
    let new_todo: NewTodo = new_todo.into_inner().into();
    let todo = web::block(move || db.create_todo(new_todo)).await??;
    Ok(HttpResponse::Created().json(TodoDto::from(todo)))
}

#[put("/todos/{id}")]
pub async fn update_todo_by_id(
    db: web::Data<Database>,
    id: web::Path<i64>,
    updated_todo: web::Json<ReplaceTodoDto>,
) -> Result<HttpResponse, TodoError> {
    let todo_id = id.into_inner();
    let changes: TodoChanges = updated_todo.into_inner().into();
    let todo = web::block(move || db.update_todo_by_id(todo_id, changes)).await??;
    Ok(HttpResponse::Ok().json(TodoDto::from(todo)))
}

#[patch("/todos/{id}/toggle")]
pub async fn toggle_todo_by_id(
    db: web::Data<Database>,
    id: web::Path<i64>,
) -> Result<HttpResponse, TodoError> {
    let todo_id = id.into_inner();
    let todo = web::block(move || db.toggle_todo_by_id(todo_id)).await??;
    Ok(HttpResponse::Ok().json(TodoDto::from(todo)))
}

#[delete("/todos/{id}")]
pub async fn delete_todo_by_id(
    db: web::Data<Database>,
    id: web::Path<i64>,
) -> Result<HttpResponse, TodoError> {
    let todo_id = id.into_inner();
    web::block(move || db.delete_todo_by_id(todo_id)).await??;
    Ok(HttpResponse::NoContent().finish())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT)
            .content_type_required(false)
            .error_handler(json_error_handler),
    )
    .app_data(web::PathConfig::default().error_handler(path_error_handler))
    .service(get_todos)
    .service(get_todo_by_id)
    .service(create_todo)
    .service(update_todo_by_id)
    .service(toggle_todo_by_id)
    .service(delete_todo_by_id);
}
