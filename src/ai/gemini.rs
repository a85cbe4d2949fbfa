use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use planner_core::models::{Priority, Role, Task, TaskPlan, TaskStatus};

use super::{AiError, ChatTurn, Collaborator, PlanContext};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CHAT_SYSTEM_INSTRUCTION: &str = "You are a helpful task planning assistant. \
    Help users by working with the current goal and task list when provided. \
    If the user is asking about existing tasks, do NOT generate an entirely new plan - \
    instead expand, explain, or modify the provided tasks. Only create a new plan when \
    the user explicitly requests it. IMPORTANT: Do NOT repeat or output the previous \
    task context or any JSON in your reply unless the user explicitly requests JSON or \
    a technical export. Use the context only to inform your natural-language responses.";

const MODIFY_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that edits a \
    provided JSON array of tasks according to a user instruction. Return ONLY valid \
    JSON: the full updated array of tasks.";

fn plan_instruction(goal: &str) -> String {
    format!(
        r#"You are a smart task planning assistant. When given a goal, break it down into actionable tasks with clear titles, deadlines (relative like "Week 1", "Day 3", etc.), priority levels (low, medium, high), categories, and dependencies between tasks.

User Goal: {goal}

Respond ONLY with valid JSON in this exact format:
{{
  "goalTitle": "Goal name here",
  "tasks": [
    {{
      "title": "Task title",
      "description": "Brief description",
      "deadline": "Week 1",
      "priority": "high",
      "category": "Category name",
      "dependencies": ["Task 1", "Task 2"]
    }}
  ]
}}"#
    )
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Reads `GEMINI_API_KEY` (required), `GEMINI_API_URL` and
    /// `STP_AI_TIMEOUT_SECS` (optional overrides).
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key =
            std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("GEMINI_API_URL") {
            config.api_url = url;
        }
        if let Ok(secs) = std::env::var("STP_AI_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().context("STP_AI_TIMEOUT_SECS must be an integer")?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// Client for a Gemini-style `generateContent` endpoint: a list of
/// role-tagged text parts in, the first candidate's text out.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> anyhow::Result<Self> {
        // Explicit timeout so a hung upstream cannot wedge the caller.
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    async fn call(&self, request: &GenerateContentRequest) -> Result<String, String> {
        let url = format!("{}?key={}", self.config.api_url, self.config.api_key);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorResponse>()
                .await
                .ok()
                .map(|e| e.error.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(message);
        }

        let data: GenerateContentResponse = response.json().await.map_err(|e| e.to_string())?;
        data.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| "Empty model response".to_string())
    }
}

#[async_trait]
impl Collaborator for GeminiClient {
    async fn generate_plan(&self, goal: &str) -> Result<TaskPlan, AiError> {
        let request = plan_request(goal);
        let text = self.call(&request).await.map_err(AiError::GenerationFailed)?;
        parse_plan(&text).map_err(AiError::GenerationFailed)
    }

    async fn chat(
        &self,
        user_message: &str,
        history: &[ChatTurn],
        _context: Option<&PlanContext>,
    ) -> Result<String, AiError> {
        let request = chat_request(user_message, history);
        self.call(&request).await.map_err(AiError::ChatFailed)
    }

    async fn modify_tasks(
        &self,
        instruction: &str,
        tasks: &[Task],
        goal_title: &str,
    ) -> Result<Vec<Task>, AiError> {
        let request =
            modify_request(instruction, tasks, goal_title).map_err(AiError::ModificationFailed)?;
        let text = self
            .call(&request)
            .await
            .map_err(AiError::ModificationFailed)?;
        parse_modified_tasks(&text).map_err(AiError::ModificationFailed)
    }
}

// ---- wire format ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn user_part(text: impl Into<String>) -> Content {
    Content {
        parts: vec![Part { text: text.into() }],
        role: Some("user".to_string()),
    }
}

fn plan_request(goal: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: plan_instruction(goal),
            }],
            role: None,
        }],
        generation_config: GenerationConfig {
            temperature: 0.7,
            response_mime_type: Some("application/json".to_string()),
        },
    }
}

/// System instruction, then the full prior history with the assistant role
/// mapped to the service's "model" role, then the new user message. Task
/// context is intentionally absent.
fn chat_request(user_message: &str, history: &[ChatTurn]) -> GenerateContentRequest {
    let mut contents = Vec::with_capacity(history.len() + 2);
    contents.push(user_part(CHAT_SYSTEM_INSTRUCTION));
    for turn in history {
        contents.push(Content {
            parts: vec![Part {
                text: turn.content.clone(),
            }],
            role: Some(
                match turn.role {
                    Role::Assistant => "model",
                    Role::User => "user",
                }
                .to_string(),
            ),
        });
    }
    contents.push(user_part(user_message));

    GenerateContentRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: 0.8,
            response_mime_type: None,
        },
    }
}

fn modify_request(
    instruction: &str,
    tasks: &[Task],
    goal_title: &str,
) -> Result<GenerateContentRequest, String> {
    let tasks_json = serde_json::to_string(tasks).map_err(|e| e.to_string())?;
    Ok(GenerateContentRequest {
        contents: vec![
            user_part(MODIFY_SYSTEM_INSTRUCTION),
            user_part(format!("Goal: {goal_title}")),
            user_part(format!("Current Tasks (JSON): {tasks_json}")),
            user_part(format!("Instruction: {instruction}")),
        ],
        generation_config: GenerationConfig {
            temperature: 0.2,
            response_mime_type: Some("application/json".to_string()),
        },
    })
}

// ---- response parsing ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    #[serde(default)]
    goal_title: Option<String>,
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    dependencies: Option<Vec<String>>,
}

fn parse_plan(text: &str) -> Result<TaskPlan, String> {
    let raw: RawPlan = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let tasks = raw
        .tasks
        .into_iter()
        .enumerate()
        .map(|(index, task)| Task {
            id: format!("task-{}", index + 1),
            title: task.title,
            description: task.description,
            deadline: task.deadline,
            priority: task.priority.unwrap_or_default(),
            category: task.category,
            dependencies: task.dependencies.unwrap_or_default(),
            status: TaskStatus::Pending,
        })
        .collect();
    Ok(TaskPlan {
        goal_title: raw.goal_title.unwrap_or_else(|| "Your Goal".to_string()),
        tasks,
    })
}

fn parse_modified_tasks(text: &str) -> Result<Vec<Task>, String> {
    let mut tasks: Vec<Task> = serde_json::from_str(text).map_err(|e| e.to_string())?;
    // The model may drop ids; reassign the positional ones it left blank.
    for (index, task) in tasks.iter_mut().enumerate() {
        if task.id.is_empty() {
            task.id = format!("task-{}", index + 1);
        }
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_plan_assigns_ids_and_defaults() {
        let text = json!({
            "goalTitle": "Learn Piano",
            "tasks": [
                {"title": "Buy a keyboard", "priority": "high", "deadline": "Week 1"},
                {"title": "Practice scales", "description": "Daily drills"}
            ]
        })
        .to_string();

        let plan = parse_plan(&text).unwrap();
        assert_eq!(plan.goal_title, "Learn Piano");
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].id, "task-1");
        assert_eq!(plan.tasks[0].priority, Priority::High);
        assert_eq!(plan.tasks[1].id, "task-2");
        assert_eq!(plan.tasks[1].priority, Priority::Medium);
        assert!(plan.tasks[1].dependencies.is_empty());
        assert_eq!(plan.tasks[1].status, TaskStatus::Pending);
    }

    #[test]
    fn parse_plan_defaults_missing_goal_title() {
        let plan = parse_plan(r#"{"tasks": []}"#).unwrap();
        assert_eq!(plan.goal_title, "Your Goal");
    }

    #[test]
    fn parse_plan_rejects_non_json() {
        assert!(parse_plan("Sure! Here is your plan:").is_err());
    }

    #[test]
    fn parse_modified_tasks_fills_blank_ids() {
        let text = json!([
            {"id": "task-1", "title": "Kept"},
            {"title": "New task", "priority": "low"}
        ])
        .to_string();

        let tasks = parse_modified_tasks(&text).unwrap();
        assert_eq!(tasks[0].id, "task-1");
        assert_eq!(tasks[1].id, "task-2");
        assert_eq!(tasks[1].priority, Priority::Low);
    }

    #[test]
    fn parse_modified_tasks_rejects_objects() {
        assert!(parse_modified_tasks(r#"{"tasks": []}"#).is_err());
    }

    #[test]
    fn chat_request_maps_roles_and_omits_context() {
        let history = vec![
            ChatTurn {
                role: Role::User,
                content: "plan my week".to_string(),
            },
            ChatTurn {
                role: Role::Assistant,
                content: "Sure, what matters most?".to_string(),
            },
        ];
        let request = chat_request("focus on health", &history);

        assert_eq!(request.contents.len(), 4);
        assert_eq!(request.contents[1].role.as_deref(), Some("user"));
        assert_eq!(request.contents[2].role.as_deref(), Some("model"));
        assert_eq!(request.contents[3].parts[0].text, "focus on health");

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["generationConfig"]["temperature"], json!(0.8));
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn plan_request_asks_for_json() {
        let body = serde_json::to_value(plan_request("learn piano")).unwrap();
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("User Goal: learn piano"));
    }

    #[test]
    fn modify_request_includes_tasks_as_json() {
        let tasks = vec![Task {
            id: "task-1".to_string(),
            title: "Stretch".to_string(),
            description: None,
            deadline: None,
            priority: Priority::Medium,
            category: None,
            dependencies: vec![],
            status: TaskStatus::Pending,
        }];
        let body =
            serde_json::to_value(modify_request("add a warmup", &tasks, "Get fit").unwrap())
                .unwrap();

        assert_eq!(body["generationConfig"]["temperature"], json!(0.2));
        let blob = body["contents"][2]["parts"][0]["text"].as_str().unwrap();
        assert!(blob.starts_with("Current Tasks (JSON):"));
        assert!(blob.contains("\"task-1\""));
    }
}
