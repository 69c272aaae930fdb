use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Maximum number of tasks returned by a single list call.
pub const LIST_LIMIT: usize = 200;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 3;

/// Task domain model - one to-do item
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub completed: bool,

    /// Always within 1..=3
    pub priority: u8,

    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw create body as sent by the front end. Every field is kept as untyped
/// JSON so coercion can follow the same rules regardless of what was sent.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskPayload {
    pub id: Option<Value>,
    pub title: Option<Value>,
    pub completed: Option<Value>,
    pub priority: Option<Value>,
    pub due_date: Option<Value>,
    pub tags: Option<Value>,
    pub notes: Option<Value>,
}

/// Raw patch body. `None` means the key was missing, `Some(Value::Null)` means
/// it was sent as an explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskPayload {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub completed: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub priority: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub tags: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A validated, fully coerced task ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub priority: u8,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

impl NewTask {
    /// Stamp the task with its creation time.
    pub fn into_task(self, now: DateTime<Utc>) -> Task {
        let now = truncate(now);
        Task {
            id: self.id,
            title: self.title,
            completed: self.completed,
            priority: self.priority,
            due_date: self.due_date,
            tags: self.tags,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One patchable field: either left untouched or replaced with a value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Absent,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Patch::Set(value) => Some(value),
            Patch::Absent => None,
        }
    }
}

/// Validated partial update. Nullable columns carry `Patch<Option<_>>` so that
/// "clear the value" is distinct from "leave it alone".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Patch<String>,
    pub completed: Patch<bool>,
    pub priority: Patch<u8>,
    pub due_date: Patch<Option<DateTime<Utc>>>,
    pub tags: Patch<Vec<String>>,
    pub notes: Patch<Option<String>>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        !(self.title.is_set()
            || self.completed.is_set()
            || self.priority.is_set()
            || self.due_date.is_set()
            || self.tags.is_set()
            || self.notes.is_set())
    }

    /// Apply the present fields to `task` and refresh `updated_at`.
    pub fn apply_to(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = self.title.as_set() {
            task.title = title.clone();
        }
        if let Some(completed) = self.completed.as_set() {
            task.completed = *completed;
        }
        if let Some(priority) = self.priority.as_set() {
            task.priority = *priority;
        }
        if let Some(due_date) = self.due_date.as_set() {
            task.due_date = *due_date;
        }
        if let Some(tags) = self.tags.as_set() {
            task.tags = tags.clone();
        }
        if let Some(notes) = self.notes.as_set() {
            task.notes = notes.clone();
        }
        task.updated_at = next_updated_at(task.updated_at, now);
    }
}

/// Timestamps are kept at microsecond precision in every backend.
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// New `updated_at` for an update happening at `now`. Never goes backwards and
/// always moves forward by at least one microsecond.
pub fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let now = truncate(now);
    let floor = previous + Duration::microseconds(1);
    if now >= floor {
        now
    } else {
        floor
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    /// Unknown or missing values fall back to `All`.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("active") => StatusFilter::Active,
            Some("completed") => StatusFilter::Completed,
            _ => StatusFilter::All,
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskSort {
    #[default]
    Created,
    Due,
    Priority,
}

impl TaskSort {
    /// Unknown or missing values fall back to `Created`.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("due") => TaskSort::Due,
            Some("priority") => TaskSort::Priority,
            _ => TaskSort::Created,
        }
    }

    /// Total order used by the in-memory backend. The SQL `ORDER BY` clauses in
    /// the relational backend must stay in lockstep with this.
    pub fn compare(self, a: &Task, b: &Task) -> Ordering {
        let newest_first = b.created_at.cmp(&a.created_at);
        let primary = match self {
            TaskSort::Created => Ordering::Equal,
            TaskSort::Due => match (a.due_date, b.due_date) {
                (Some(a_due), Some(b_due)) => a_due.cmp(&b_due),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            TaskSort::Priority => a.priority.cmp(&b.priority),
        };
        primary.then(newest_first).then_with(|| a.id.cmp(&b.id))
    }
}

/// Parsed list parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    /// Trimmed search text; `None` when blank.
    pub q: Option<String>,
    pub status: StatusFilter,
    pub sort: TaskSort,
    pub limit: usize,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            q: None,
            status: StatusFilter::All,
            sort: TaskSort::Created,
            limit: LIST_LIMIT,
        }
    }
}

impl TaskQuery {
    pub fn from_params(q: Option<&str>, status: Option<&str>, sort: Option<&str>) -> Self {
        let q = q.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        Self {
            q,
            status: StatusFilter::from_param(status),
            sort: TaskSort::from_param(sort),
            limit: LIST_LIMIT,
        }
    }

    /// Search text lowered the same way the `fold_case` SQL function does.
    pub fn needle(&self) -> Option<String> {
        self.q.as_deref().map(fold_case)
    }

    /// Free-text and status filter, applied by the in-memory backend.
    /// `needle` is [`TaskQuery::needle`], folded once by the caller.
    pub fn matches(&self, task: &Task, needle: Option<&str>) -> bool {
        if !self.status.matches(task) {
            return false;
        }
        match needle {
            None => true,
            Some(needle) => {
                fold_case(&task.title).contains(needle)
                    || fold_case(task.notes.as_deref().unwrap_or("")).contains(needle)
            }
        }
    }
}

/// Case folding shared by both backends.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
