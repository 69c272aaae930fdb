use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Level comes from `RUST_LOG`, default
/// `info`. CloudWatch stamps every line, so no timestamps or colours here.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .init();
}
