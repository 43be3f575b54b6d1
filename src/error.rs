use actix_web::error::{BlockingError, JsonPayloadError, PathError};
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::error::Category;

pub const TODO_NOT_FOUND: &str = "Todo not found";

/// One entry of a 422 response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize)]
struct ErrorBody<T: Serialize> {
    detail: T,
}

#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("todo not found")]
    NotFound,
    #[error("request validation failed")]
    Validation(Vec<FieldError>),
    #[error("failed to get a database connection: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("failed to run migrations: {0}")]
    Migration(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("blocking thread pool is gone")]
    Blocking(#[from] BlockingError),
}

impl FieldError {
    fn new(loc: &[&str], msg: impl Into<String>, kind: &str) -> Self {
        Self {
            loc: loc.iter().map(|part| part.to_string()).collect(),
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }
}

impl ResponseError for TodoError {
    fn status_code(&self) -> StatusCode {
        match self {
            TodoError::NotFound => StatusCode::NOT_FOUND,
            TodoError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        match self {
            TodoError::NotFound => response.json(ErrorBody {
                detail: TODO_NOT_FOUND,
            }),
            TodoError::Validation(errors) => response.json(ErrorBody { detail: errors }),
            other => {
                tracing::error!(error = %other, "request failed");
                response.json(ErrorBody {
                    detail: "Internal Server Error",
                })
            }
        }
    }
}

/// Turns a rejected JSON body into a 422 before any handler runs.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let field_error = match &err {
        JsonPayloadError::Deserialize(inner) => {
            let kind = match inner.classify() {
                Category::Syntax | Category::Eof => "json_invalid",
                Category::Data if inner.to_string().starts_with("missing field") => "missing",
                _ => "value_error",
            };
            FieldError::new(&["body"], inner.to_string(), kind)
        }
        JsonPayloadError::ContentType => FieldError::new(&["body"], err.to_string(), "content_type"),
        other => FieldError::new(&["body"], other.to_string(), "value_error"),
    };
    tracing::debug!(error = %err, "rejected request body");
    TodoError::Validation(vec![field_error]).into()
}

/// Turns a malformed `{id}` segment into a 422.
pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    let field_error = FieldError::new(&["path", "id"], err.to_string(), "int_parsing");
    TodoError::Validation(vec![field_error]).into()
}
