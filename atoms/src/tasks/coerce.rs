//! Turns loosely typed JSON payloads into validated task values.
//!
//! The front end sends whatever a form produced, so every field is accepted as
//! raw JSON and normalised here before anything touches storage. Both backends
//! see only the output of this module.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::error::TaskError;
use super::model::{
    truncate, CreateTaskPayload, NewTask, Patch, TaskChanges, UpdateTaskPayload, MAX_PRIORITY,
    MIN_PRIORITY,
};

/// JavaScript-style truthiness.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn title(value: Option<&Value>) -> Result<String, TaskError> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(TaskError::validation("title is required")),
    }
}

/// Clamp into 1..=3. Anything that does not read as an integer becomes 1.
pub fn priority(value: Option<&Value>) -> u8 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => leading_int(s),
        _ => None,
    };
    match parsed {
        Some(n) => n.clamp(i64::from(MIN_PRIORITY), i64::from(MAX_PRIORITY)) as u8,
        None => MIN_PRIORITY,
    }
}

/// `parseInt`-style prefix parse: leading whitespace, optional sign, digits.
fn leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits: &str = &rest[..rest.bytes().take_while(u8::is_ascii_digit).count()];
    if digits.is_empty() {
        return None;
    }
    // Too many digits to fit is still "a big number"; saturate.
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Non-array input means no tags. Falsy entries are dropped; nested arrays
/// and objects are kept as their JSON text.
pub fn tags(value: Option<&Value>) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| truthy(item))
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

pub fn notes(value: Option<&Value>) -> Result<Option<String>, TaskError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(TaskError::validation("notes must be text")),
    }
}

/// Falsy values mean "no due date".
pub fn due_date(value: Option<&Value>) -> Result<Option<DateTime<Utc>>, TaskError> {
    let value = match value {
        Some(v) if truthy(v) => v,
        _ => return Ok(None),
    };
    let parsed = match value {
        Value::String(s) => parse_timestamp(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    let ts = parsed.ok_or_else(|| TaskError::validation("due_date is not a valid date"))?;
    if !(0..=9999).contains(&ts.year()) {
        return Err(TaskError::validation("due_date is out of range"));
    }
    Ok(Some(truncate(ts)))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    // Offsets written without a colon, e.g. `+0200`.
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Caller-supplied id, or a fresh UUID when none was given.
pub fn id(value: Option<&Value>) -> Result<String, TaskError> {
    match value {
        Some(v) if !truthy(v) => Ok(generate_id()),
        None => Ok(generate_id()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(generate_id()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(TaskError::validation("id must be a string")),
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validate and coerce a create body.
pub fn new_task(payload: &CreateTaskPayload) -> Result<NewTask, TaskError> {
    let title = title(payload.title.as_ref())?;
    Ok(NewTask {
        id: id(payload.id.as_ref())?,
        title,
        completed: payload.completed.as_ref().map(truthy).unwrap_or(false),
        priority: priority(payload.priority.as_ref()),
        due_date: due_date(payload.due_date.as_ref())?,
        tags: tags(payload.tags.as_ref()),
        notes: notes(payload.notes.as_ref())?,
    })
}

/// Validate and coerce a patch body. Explicit `null` leaves non-nullable
/// fields alone and clears nullable ones.
pub fn changes(payload: &UpdateTaskPayload) -> Result<TaskChanges, TaskError> {
    let mut changes = TaskChanges::default();

    if let Some(v) = non_null(&payload.title) {
        changes.title = Patch::Set(title(Some(v))?);
    }
    if let Some(v) = non_null(&payload.completed) {
        changes.completed = Patch::Set(truthy(v));
    }
    if let Some(v) = non_null(&payload.priority) {
        changes.priority = Patch::Set(priority(Some(v)));
    }
    if let Some(v) = &payload.due_date {
        changes.due_date = Patch::Set(due_date(Some(v))?);
    }
    if let Some(v) = non_null(&payload.tags) {
        changes.tags = Patch::Set(tags(Some(v)));
    }
    if let Some(v) = &payload.notes {
        changes.notes = Patch::Set(notes(Some(v))?);
    }

    if changes.is_empty() {
        return Err(TaskError::validation("no fields to update"));
    }
    Ok(changes)
}

fn non_null(field: &Option<Value>) -> Option<&Value> {
    field.as_ref().filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn priority_is_always_in_range() {
        let cases = [
            (json!(-5), 1),
            (json!(0), 1),
            (json!(1), 1),
            (json!(2), 2),
            (json!(3), 3),
            (json!(7), 3),
            (json!("abc"), 1),
            (json!("2"), 2),
            (json!(" 3 stars"), 3),
            (json!(2.9), 2),
            (json!(true), 1),
            (json!(null), 1),
        ];
        for (input, expected) in cases {
            assert_eq!(priority(Some(&input)), expected, "input {input}");
        }
        assert_eq!(priority(None), 1);
    }

    #[test]
    fn title_is_trimmed_and_required() {
        assert_eq!(title(Some(&json!("  Buy milk "))).unwrap(), "Buy milk");
        assert!(matches!(
            title(Some(&json!("   "))),
            Err(TaskError::Validation(_))
        ));
        assert!(title(None).is_err());
        assert!(title(Some(&json!(42))).is_err());
    }

    #[test]
    fn tags_drop_falsy_entries() {
        assert_eq!(
            tags(Some(&json!(["home", "", null, 0, false, 4, "work"]))),
            vec!["home", "4", "work"]
        );
        assert_eq!(
            tags(Some(&json!([["a", 1], {"k": "v"}, true]))),
            vec![r#"["a",1]"#, r#"{"k":"v"}"#, "true"]
        );
        assert!(tags(Some(&json!("home,work"))).is_empty());
        assert!(tags(None).is_empty());
    }

    #[test]
    fn due_date_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(due_date(Some(&json!("2024-01-01"))).unwrap(), Some(midnight));
        assert_eq!(
            due_date(Some(&json!("2024-01-01T02:00:00+02:00"))).unwrap(),
            Some(midnight)
        );
        assert_eq!(
            due_date(Some(&json!("2024-01-01T02:00:00+0200"))).unwrap(),
            Some(midnight)
        );
        assert_eq!(
            due_date(Some(&json!("2024-01-01T02:00:00.5+0200"))).unwrap(),
            Some(midnight + chrono::Duration::milliseconds(500))
        );
        assert_eq!(
            due_date(Some(&json!(midnight.timestamp_millis()))).unwrap(),
            Some(midnight)
        );
        assert_eq!(due_date(Some(&json!(""))).unwrap(), None);
        assert_eq!(due_date(Some(&json!(null))).unwrap(), None);
        assert!(due_date(Some(&json!("next tuesday"))).is_err());
        assert!(due_date(Some(&json!({"y": 2024}))).is_err());
    }

    #[test]
    fn due_date_is_truncated_to_micros() {
        let parsed = due_date(Some(&json!("2024-05-05T10:00:00.123456789Z")))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn notes_pass_through() {
        assert_eq!(notes(Some(&json!("hi"))).unwrap().as_deref(), Some("hi"));
        assert_eq!(notes(Some(&json!(null))).unwrap(), None);
        assert!(notes(Some(&json!(["a"]))).is_err());
    }

    #[test]
    fn id_is_generated_when_missing() {
        assert_eq!(id(Some(&json!("abc"))).unwrap(), "abc");
        let generated = id(None).unwrap();
        assert!(uuid::Uuid::parse_str(&generated).is_ok());
        assert_ne!(id(Some(&json!(""))).unwrap(), "");
        assert!(id(Some(&json!(["x"]))).is_err());
    }

    #[test]
    fn new_task_defaults() {
        let payload: CreateTaskPayload =
            serde_json::from_value(json!({"title": " Walk dog "})).unwrap();
        let task = new_task(&payload).unwrap();
        assert_eq!(task.title, "Walk dog");
        assert!(!task.completed);
        assert_eq!(task.priority, 1);
        assert_eq!(task.due_date, None);
        assert!(task.tags.is_empty());
        assert_eq!(task.notes, None);
    }

    #[test]
    fn patch_distinguishes_null_from_missing() {
        let payload: UpdateTaskPayload =
            serde_json::from_value(json!({"notes": null, "priority": null})).unwrap();
        let changes = changes(&payload).unwrap();
        assert_eq!(changes.notes, Patch::Set(None));
        assert_eq!(changes.priority, Patch::Absent);
        assert_eq!(changes.title, Patch::Absent);
    }

    #[test]
    fn patch_without_recognised_fields_is_rejected() {
        let payload: UpdateTaskPayload =
            serde_json::from_value(json!({"colour": "red", "title": null})).unwrap();
        assert_eq!(
            changes(&payload),
            Err(TaskError::validation("no fields to update"))
        );
    }

    #[test]
    fn patch_rejects_blank_title() {
        let payload: UpdateTaskPayload =
            serde_json::from_value(json!({"title": "  "})).unwrap();
        assert!(matches!(changes(&payload), Err(TaskError::Validation(_))));
    }
}
