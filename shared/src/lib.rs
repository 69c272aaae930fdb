pub mod config;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, Settings};
pub use state::AppState;
