//! Non-durable fallback backend used when no database is configured.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::error::{StoreError, StoreResult};
use super::model::{Task, TaskChanges, TaskQuery};
use super::repository::{Backend, TaskRepository};

/// Tasks held in process memory. Each instance owns its own collection.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tasks: Mutex<Vec<Task>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tasks(&self) -> StoreResult<MutexGuard<'_, Vec<Task>>> {
        self.tasks
            .lock()
            .map_err(|_| StoreError::Internal("in-memory task lock poisoned".to_string()))
    }
}

impl TaskRepository for InMemoryRepository {
    fn backend(&self) -> Backend {
        Backend::InMemory
    }

    fn list(&self, query: &TaskQuery) -> StoreResult<Vec<Task>> {
        let needle = query.needle();
        let tasks = self.tasks()?;
        let mut found: Vec<Task> = tasks
            .iter()
            .filter(|t| query.matches(t, needle.as_deref()))
            .cloned()
            .collect();
        found.sort_by(|a, b| query.sort.compare(a, b));
        found.truncate(query.limit);
        Ok(found)
    }

    fn get(&self, id: &str) -> StoreResult<Option<Task>> {
        Ok(self.tasks()?.iter().find(|t| t.id == id).cloned())
    }

    fn insert(&self, task: &Task) -> StoreResult<Task> {
        let mut tasks = self.tasks()?;
        if tasks.iter().any(|t| t.id == task.id) {
            return Err(StoreError::Conflict(task.id.clone()));
        }
        tasks.push(task.clone());
        Ok(task.clone())
    }

    fn update(
        &self,
        id: &str,
        changes: &TaskChanges,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        let mut tasks = self.tasks()?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        changes.apply_to(task, now);
        Ok(Some(task.clone()))
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut tasks = self.tasks()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        Ok(tasks.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::{Patch, StatusFilter, TaskSort};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn task(id: &str, created: i64, completed: bool) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            completed,
            priority: 2,
            due_date: None,
            tags: vec!["home".into()],
            notes: None,
            created_at: at(created),
            updated_at: at(created),
        }
    }

    #[test]
    fn insert_and_get() {
        let repo = InMemoryRepository::new();
        repo.insert(&task("a", 0, false)).unwrap();
        assert_eq!(repo.get("a").unwrap().unwrap().title, "Task a");
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_conflicts() {
        let repo = InMemoryRepository::new();
        repo.insert(&task("a", 0, false)).unwrap();
        let err = repo.insert(&task("a", 1, false)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(id) if id == "a"));
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let repo = InMemoryRepository::new();
        repo.insert(&task("old", 0, false)).unwrap();
        repo.insert(&task("done", 5, true)).unwrap();
        repo.insert(&task("new", 10, false)).unwrap();

        let all = repo.list(&TaskQuery::default()).unwrap();
        let ids: Vec<_> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["new", "done", "old"]);

        let active = repo
            .list(&TaskQuery {
                status: StatusFilter::Active,
                ..Default::default()
            })
            .unwrap();
        assert!(active.iter().all(|t| !t.completed));
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn list_respects_limit() {
        let repo = InMemoryRepository::new();
        for i in 0..5 {
            repo.insert(&task(&format!("t{i}"), i, false)).unwrap();
        }
        let listed = repo
            .list(&TaskQuery {
                limit: 3,
                sort: TaskSort::Created,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, "t4");
    }

    #[test]
    fn search_folds_query_and_fields() {
        let repo = InMemoryRepository::new();
        let mut milk = task("milk", 0, false);
        milk.title = "Buy ÖL and MILK".into();
        repo.insert(&milk).unwrap();
        let mut notes = task("notes", 1, false);
        notes.notes = Some("öl for the car".into());
        repo.insert(&notes).unwrap();
        repo.insert(&task("other", 2, false)).unwrap();

        let listed = repo
            .list(&TaskQuery::from_params(Some("Öl"), None, None))
            .unwrap();
        let ids: Vec<_> = listed.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["notes", "milk"]);
    }

    #[test]
    fn update_missing_returns_none() {
        let repo = InMemoryRepository::new();
        let changes = TaskChanges {
            completed: Patch::Set(true),
            ..Default::default()
        };
        assert!(repo.update("nope", &changes, at(1)).unwrap().is_none());
    }

    #[test]
    fn update_patches_in_place() {
        let repo = InMemoryRepository::new();
        repo.insert(&task("a", 0, false)).unwrap();
        let changes = TaskChanges {
            tags: Patch::Set(vec![]),
            ..Default::default()
        };
        let updated = repo.update("a", &changes, at(30)).unwrap().unwrap();
        assert!(updated.tags.is_empty());
        assert_eq!(updated.updated_at, at(30));
        assert_eq!(repo.get("a").unwrap().unwrap(), updated);
    }

    #[test]
    fn delete_is_idempotent() {
        let repo = InMemoryRepository::new();
        repo.insert(&task("a", 0, false)).unwrap();
        assert!(repo.delete("a").unwrap());
        assert!(!repo.delete("a").unwrap());
        assert!(repo.get("a").unwrap().is_none());
    }
}
