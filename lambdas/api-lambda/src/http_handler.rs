use std::sync::Arc;

use lambda_http::http::header::HeaderValue;
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use percent_encoding::percent_decode_str;
use tasklist_atoms::tasks::{self, TaskError, TaskQuery};
use tasklist_shared::AppState;

fn with_cors_headers(mut resp: Response<Body>, allow_origin: &str) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_str(allow_origin).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PUT,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
    resp
}

/// Attach CORS headers. Anything that still failed is logged and turned into a
/// generic 500 so the cause never reaches the client.
fn finalize_response(
    resp: Result<Response<Body>, Error>,
    allow_origin: &str,
) -> Result<Response<Body>, Error> {
    let resp = resp.or_else(|e| {
        tracing::error!(error = %e, "request failed");
        tasks::http::error_response(&TaskError::internal())
    });
    resp.map(|r| with_cors_headers(r, allow_origin))
}

/// Which part of the tasks resource a path addresses. Any path ending in
/// `/tasks`, `/tasks/` or `/tasks/{id}` is ours, whatever prefix the gateway
/// or function mount adds in front. A segment after `/tasks/` is always an
/// id, so `/tasks/tasks` addresses the task whose id is `tasks`.
fn task_route(path: &str) -> Option<Option<&str>> {
    if let Some((head, id)) = path.rsplit_once('/') {
        if head.ends_with("/tasks") && !id.is_empty() {
            return Some(Some(id));
        }
    }
    (path.ends_with("/tasks") || path.ends_with("/tasks/")).then_some(None)
}

fn decode_id(raw: &str) -> Result<String, TaskError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|id| id.into_owned())
        .map_err(|_| TaskError::validation("invalid task id"))
}

fn list_query(event: &Request) -> TaskQuery {
    let params = event.query_string_parameters_ref();
    TaskQuery::from_params(
        params.and_then(|p| p.first("q")),
        params.and_then(|p| p.first("status")),
        params.and_then(|p| p.first("sort")),
    )
}

/// Main Lambda handler - routes requests to the task endpoints
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let allow_origin = state.settings.cors_allow_origin.as_str();
    tracing::info!("Tasks API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return finalize_response(tasks::http::no_content(), allow_origin);
    }

    let Some(raw_id) = task_route(path) else {
        tracing::warn!("No route matched - Method: {} Path: {}", method, path);
        return finalize_response(not_found(), allow_origin);
    };
    let id = match raw_id.map(decode_id).transpose() {
        Ok(id) => id,
        Err(e) => return finalize_response(tasks::http::error_response(&e), allow_origin),
    };

    let service = &state.tasks;
    let resp = match (method, id.as_deref()) {
        // GET /tasks/{id} - get task
        (&Method::GET, Some(id)) => tasks::http::get_task(service, id).await,
        // GET /tasks?q=&status=&sort= - list tasks
        (&Method::GET, None) => tasks::http::list_tasks(service, list_query(&event)).await,
        // POST /tasks - create task
        (&Method::POST, _) => tasks::http::create_task(service, event.body()).await,
        // PUT|PATCH /tasks/{id} - update task
        (&Method::PUT | &Method::PATCH, id) => {
            tasks::http::update_task(service, id, event.body()).await
        }
        // DELETE /tasks/{id} - delete task
        (&Method::DELETE, id) => tasks::http::delete_task(service, id).await,
        _ => method_not_allowed(),
    };
    finalize_response(resp, allow_origin)
}

fn method_not_allowed() -> Result<Response<Body>, Error> {
    tasks::http::json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({"error": "method not allowed"}),
    )
}

fn not_found() -> Result<Response<Body>, Error> {
    tasks::http::json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({"error": "not found"}),
    )
}
