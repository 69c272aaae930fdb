//! Business rules for tasks, independent of where they are stored.
//!
//! Validation and coercion always run before the repository is touched.
//! Storage failures are translated into [`TaskError`] here and nowhere else.

use std::sync::Arc;

use chrono::Utc;

use super::coerce;
use super::error::TaskError;
use super::model::{CreateTaskPayload, Task, TaskQuery, UpdateTaskPayload};
use super::repository::{Backend, TaskRepository};

/// Task operations over whichever backend was chosen at startup.
#[derive(Clone)]
pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
}

impl TaskService {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self { repo }
    }

    pub fn backend(&self) -> Backend {
        self.repo.backend()
    }

    /// List tasks. Never fails on bad filter values, only on storage errors.
    pub fn list(&self, query: &TaskQuery) -> Result<Vec<Task>, TaskError> {
        self.repo
            .list(query)
            .map_err(|e| TaskError::from_store("list", e))
    }

    pub fn get(&self, id: &str) -> Result<Task, TaskError> {
        self.repo
            .get(id)
            .map_err(|e| TaskError::from_store("get", e))?
            .ok_or_else(TaskError::not_found)
    }

    pub fn create(&self, payload: &CreateTaskPayload) -> Result<Task, TaskError> {
        let task = coerce::new_task(payload)?.into_task(Utc::now());
        let stored = self
            .repo
            .insert(&task)
            .map_err(|e| TaskError::from_store("create", e))?;
        tracing::info!(task_id = %stored.id, backend = self.backend().as_str(), "task created");
        Ok(stored)
    }

    /// Partial update. `id` comes from the request path and may be missing.
    pub fn update(&self, id: Option<&str>, payload: &UpdateTaskPayload) -> Result<Task, TaskError> {
        let id = require_id(id)?;
        let changes = coerce::changes(payload)?;
        self.repo
            .update(id, &changes, Utc::now())
            .map_err(|e| TaskError::from_store("update", e))?
            .ok_or_else(TaskError::not_found)
    }

    /// Removing a task that does not exist is not an error.
    pub fn delete(&self, id: Option<&str>) -> Result<(), TaskError> {
        let id = require_id(id)?;
        let removed = self
            .repo
            .delete(id)
            .map_err(|e| TaskError::from_store("delete", e))?;
        if removed {
            tracing::info!(task_id = %id, "task deleted");
        }
        Ok(())
    }
}

fn require_id(id: Option<&str>) -> Result<&str, TaskError> {
    id.filter(|id| !id.trim().is_empty())
        .ok_or_else(|| TaskError::validation("id required"))
}
