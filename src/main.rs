use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder, Result};
use anyhow::Context;
use serde::Serialize;

use crate::config::Config;
use crate::repository::database::Database;

mod api;
mod config;
mod error;
mod models;
mod repository;
mod telemetry;

#[derive(Serialize)]
pub struct Response {
    pub message: String,
}

#[derive(Serialize)]
struct NotFound {
    detail: &'static str,
}

#[get("/")]
async fn healthcheck() -> impl Responder {
    let response = Response {
        message: "Healthy".to_string(),
    };
    HttpResponse::Ok().json(response)
}

async fn not_found() -> Result<HttpResponse> {
    Ok(HttpResponse::NotFound().json(NotFound {
        detail: "Not Found",
    }))
}

fn cors(origin: &str) -> Cors {
    Cors::default()
        .allowed_origin(origin)
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

/// Opens the pool, applies migrations and seeds an empty table.
fn setup(config: &Config) -> anyhow::Result<web::Data<Database>> {
    let todo_db = Database::new(&config.database_path, config.pool_size)
        .with_context(|| format!("failed to open database at {}", config.database_path))?;
    todo_db
        .run_migrations()
        .context("failed to create the todos table")?;
    let seeded = todo_db
        .seed_if_empty()
        .context("failed to seed sample todos")?;
    tracing::info!(database = %config.database_path, seeded, "database ready");
    Ok(web::Data::new(todo_db))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::new()?;
    telemetry::init_subscriber(env!("CARGO_PKG_NAME"), "info")?;

    let app_data = setup(&config)?;
    let cors_origin = config.cors_origin.clone();

    tracing::info!(host = %config.host, port = config.port, "starting server");
    HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .service(healthcheck)
            .configure(api::api::config)
            .default_service(web::route().to(not_found))
            .wrap(cors(&cors_origin))
            .wrap(actix_web::middleware::Logger::default())
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;
    Ok(())
}
