use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::TaskError;
use super::model::{CreateTaskPayload, TaskQuery, UpdateTaskPayload};
use super::service::TaskService;

/// GET /tasks
pub async fn list_tasks(service: &TaskService, query: TaskQuery) -> Result<Response<Body>, Error> {
    let result = run(service, move |svc| svc.list(&query)).await;
    respond(StatusCode::OK, result)
}

/// GET /tasks/{id}
pub async fn get_task(service: &TaskService, id: &str) -> Result<Response<Body>, Error> {
    let id = id.to_string();
    let result = run(service, move |svc| svc.get(&id)).await;
    respond(StatusCode::OK, result)
}

/// POST /tasks
pub async fn create_task(service: &TaskService, body: &[u8]) -> Result<Response<Body>, Error> {
    let payload: CreateTaskPayload = match parse_body(body) {
        Ok(payload) => payload,
        Err(e) => return error_response(&e),
    };
    let result = run(service, move |svc| svc.create(&payload)).await;
    respond(StatusCode::CREATED, result)
}

/// PUT|PATCH /tasks/{id}
pub async fn update_task(
    service: &TaskService,
    id: Option<&str>,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let payload: UpdateTaskPayload = match parse_body(body) {
        Ok(payload) => payload,
        Err(e) => return error_response(&e),
    };
    let id = id.map(String::from);
    let result = run(service, move |svc| svc.update(id.as_deref(), &payload)).await;
    respond(StatusCode::OK, result)
}

/// DELETE /tasks/{id}
pub async fn delete_task(service: &TaskService, id: Option<&str>) -> Result<Response<Body>, Error> {
    let id = id.map(String::from);
    match run(service, move |svc| svc.delete(id.as_deref())).await {
        Ok(()) => no_content(),
        Err(e) => error_response(&e),
    }
}

/// Run a service call off the async executor; SQLite I/O is blocking.
async fn run<T, F>(service: &TaskService, op: F) -> Result<T, TaskError>
where
    T: Send + 'static,
    F: FnOnce(&TaskService) -> Result<T, TaskError> + Send + 'static,
{
    let service = service.clone();
    match tokio::task::spawn_blocking(move || op(&service)).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "task operation did not complete");
            Err(TaskError::internal())
        }
    }
}

/// An empty body reads as `{}`. Anything but a JSON object is rejected.
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, TaskError> {
    let value: serde_json::Value = if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|_| TaskError::validation("invalid JSON body"))?
    };
    if !value.is_object() {
        return Err(TaskError::validation("request body must be a JSON object"));
    }
    serde_json::from_value(value).map_err(|_| TaskError::validation("invalid request body"))
}

fn respond<T: Serialize>(
    status: StatusCode,
    result: Result<T, TaskError>,
) -> Result<Response<Body>, Error> {
    match result {
        Ok(value) => json_response(status, &value),
        Err(e) => error_response(&e),
    }
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

/// `{"error": "..."}` with the status matching the error kind.
pub fn error_response(err: &TaskError) -> Result<Response<Body>, Error> {
    json_response(err.status_code(), &serde_json::json!({ "error": err.to_string() }))
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::Empty)
        .map_err(Box::new)?)
}
