use chrono::{DateTime, Utc};

use super::error::StoreResult;
use super::model::{Task, TaskChanges, TaskQuery};

/// Which storage a repository writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// SQLite file, survives restarts.
    Relational,
    /// Process memory, lost on restart.
    InMemory,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Relational => "relational",
            Backend::InMemory => "in-memory",
        }
    }
}

/// Storage capability behind [`TaskService`](super::service::TaskService).
///
/// Implementations receive input that has already been validated and coerced,
/// and must return identical results for identical calls: same filtering, same
/// order (see [`TaskSort::compare`](super::model::TaskSort::compare)), same
/// stamping (see [`TaskChanges::apply_to`]).
pub trait TaskRepository: Send + Sync {
    fn backend(&self) -> Backend;

    /// Filtered, ordered and capped at `query.limit`.
    fn list(&self, query: &TaskQuery) -> StoreResult<Vec<Task>>;

    fn get(&self, id: &str) -> StoreResult<Option<Task>>;

    /// Store a new task. Fails with `StoreError::Conflict` if the id is taken.
    fn insert(&self, task: &Task) -> StoreResult<Task>;

    /// Apply `changes` to the task with `id`. `Ok(None)` when it does not exist.
    fn update(
        &self,
        id: &str,
        changes: &TaskChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>>;

    /// Returns `true` if a task was removed.
    fn delete(&self, id: &str) -> StoreResult<bool>;
}
