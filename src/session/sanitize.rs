//! Output sanitization policy.
//!
//! The AI collaborator is instructed not to echo structured task data into
//! conversational replies, but an external text generator cannot be trusted
//! to follow that. When the user did not ask for a technical reply, anything
//! that looks like structured context is rewritten into a human-readable
//! summary before it reaches the chat log.

use serde_json::Value;

const CONTEXT_MARKER: &str = "TASK_CONTEXT_JSON:";

/// Rewrites a raw model reply for display. Plain prose passes through
/// unchanged, which makes the policy idempotent.
pub fn sanitize_reply(text: &str) -> String {
    if let Some(rest) = text.strip_prefix(CONTEXT_MARKER) {
        if let Ok(value) = serde_json::from_str::<Value>(rest.trim()) {
            return summarize_tasks(&value);
        }
        // Unparseable marker payload falls through to the raw checks below.
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return match serde_json::from_str::<Value>(trimmed) {
            Ok(value) if value.get("tasks").is_some_and(Value::is_array) => summarize_tasks(&value),
            Ok(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
            }
            Err(_) => text.to_string(),
        };
    }

    text.to_string()
}

fn summarize_tasks(value: &Value) -> String {
    let goal = value
        .get("goalTitle")
        .and_then(Value::as_str)
        .unwrap_or("Untitled");
    let mut lines = vec![format!("Task summary for goal: {goal}")];

    if let Some(tasks) = value.get("tasks").and_then(Value::as_array) {
        for (index, task) in tasks.iter().enumerate() {
            let title = task.get("title").and_then(Value::as_str).unwrap_or("");
            let description = task
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("");
            let mut line = format!("{}. {} — {}", index + 1, title, description);
            if let Some(deadline) = task.get("deadline").and_then(Value::as_str) {
                line.push_str(&format!(" Deadline: {deadline}."));
            }
            lines.push(line.trim_end().to_string());
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_prose_passes_through_unchanged() {
        let reply = "Sounds good! Start with the first task and check in next week.";
        assert_eq!(sanitize_reply(reply), reply);
    }

    #[test]
    fn is_idempotent_on_sanitized_output() {
        let once = sanitize_reply(
            &json!({
                "goalTitle": "Learn Piano",
                "tasks": [{"title": "Buy a keyboard", "deadline": "Week 1"}]
            })
            .to_string(),
        );
        assert_eq!(sanitize_reply(&once), once);
    }

    #[test]
    fn strips_context_marker_and_summarizes() {
        let reply = format!(
            "TASK_CONTEXT_JSON: {}",
            json!({
                "goalTitle": "Ship the app",
                "tasks": [
                    {"title": "Write tests", "description": "Cover the API", "deadline": "Week 2"},
                    {"title": "Fix bugs"}
                ]
            })
        );
        let out = sanitize_reply(&reply);
        assert_eq!(
            out,
            "Task summary for goal: Ship the app\n\
             1. Write tests — Cover the API Deadline: Week 2.\n\
             2. Fix bugs —"
        );
    }

    #[test]
    fn bare_task_json_is_summarized() {
        let reply = json!({
            "goalTitle": "Run a 10k",
            "tasks": [{"title": "Buy shoes"}]
        })
        .to_string();
        let out = sanitize_reply(&reply);
        assert!(out.starts_with("Task summary for goal: Run a 10k"));
        assert!(out.contains("1. Buy shoes"));
    }

    #[test]
    fn other_json_is_pretty_printed() {
        let out = sanitize_reply(r#"{"note":"keep going"}"#);
        assert_eq!(out, "{\n  \"note\": \"keep going\"\n}");
    }

    #[test]
    fn broken_json_is_left_alone() {
        let reply = "{not json at all";
        assert_eq!(sanitize_reply(reply), reply);

        let marked = "TASK_CONTEXT_JSON: {broken";
        assert_eq!(sanitize_reply(marked), marked);
    }
}
