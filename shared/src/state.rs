use std::sync::Arc;

use tasklist_atoms::tasks::{
    Backend, InMemoryRepository, RelationalRepository, StoreError, TaskRepository, TaskService,
};

use crate::config::Settings;

/// Everything a request handler needs, built once per cold start.
pub struct AppState {
    pub tasks: TaskService,
    pub settings: Settings,
}

impl AppState {
    /// Pick the backend. Without a database path the service runs on the
    /// in-memory fallback for the lifetime of the process.
    pub fn from_settings(settings: Settings) -> Result<Self, StoreError> {
        let repo: Arc<dyn TaskRepository> = match settings.database_path.as_deref() {
            Some(path) => {
                tracing::info!(path, "using SQLite task store");
                Arc::new(RelationalRepository::open(path, &settings.connection)?)
            }
            None => {
                tracing::warn!(
                    "no database configured; tasks are kept in memory and lost on restart"
                );
                Arc::new(InMemoryRepository::new())
            }
        };
        Ok(Self {
            tasks: TaskService::new(repo),
            settings,
        })
    }

    pub fn backend(&self) -> Backend {
        self.tasks.backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_memory_without_a_database() {
        let state = AppState::from_settings(Settings::default()).unwrap();
        assert_eq!(state.backend(), Backend::InMemory);
    }

    #[test]
    fn opens_sqlite_when_a_path_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            database_path: Some(dir.path().join("tasks.db").to_string_lossy().into_owned()),
            ..Settings::default()
        };
        let state = AppState::from_settings(settings).unwrap();
        assert_eq!(state.backend(), Backend::Relational);
    }
}
