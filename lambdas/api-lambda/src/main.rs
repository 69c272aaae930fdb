mod http_handler;

use std::sync::Arc;

use lambda_http::{run, service_fn, Error, Request};
use tasklist_shared::{telemetry, AppState, Settings};

#[tokio::main]
async fn main() -> Result<(), Error> {
    telemetry::init();

    let settings = Settings::from_env()?;
    let state = Arc::new(AppState::from_settings(settings)?);
    tracing::info!(backend = state.backend().as_str(), "tasks API ready");

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
