//! AI collaborator client.
//!
//! Three capabilities against an external text/JSON completion service:
//! free-form chat reply, structured plan generation, and structured plan
//! modification. Each is a single request/response call; the service holds
//! no conversation state, so the full history is resent on every chat call.
//! Nothing is retried here; retry, if any, is the caller's responsibility.

use async_trait::async_trait;
use thiserror::Error;

use planner_core::models::{Role, Task, TaskPlan};

mod gemini;

pub use gemini::{GeminiClient, GeminiConfig};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("plan generation failed: {0}")]
    GenerationFailed(String),
    #[error("chat reply failed: {0}")]
    ChatFailed(String),
    #[error("task modification failed: {0}")]
    ModificationFailed(String),
}

/// One prior conversation turn, as resent to the service.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Current plan state offered to `chat` as context. Accepted by the
/// interface but deliberately not forwarded to the service: chat replies are
/// generated from conversation history alone, so the service cannot leak raw
/// structured data into prose it was given out of band.
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub goal_title: String,
    pub tasks: Vec<Task>,
}

#[async_trait]
pub trait Collaborator: Send + Sync {
    /// Breaks a goal down into a structured plan. Task ids are assigned
    /// here after parsing (`task-1`..`task-N`), not by the service.
    async fn generate_plan(&self, goal: &str) -> Result<TaskPlan, AiError>;

    /// Natural-language reply from the system instruction plus the full
    /// prior history plus the new user message.
    async fn chat(
        &self,
        user_message: &str,
        history: &[ChatTurn],
        context: Option<&PlanContext>,
    ) -> Result<String, AiError>;

    /// Edits the current task array per a free-text instruction. Returns the
    /// full replacement array; there are no partial/merge semantics.
    async fn modify_tasks(
        &self,
        instruction: &str,
        tasks: &[Task],
        goal_title: &str,
    ) -> Result<Vec<Task>, AiError>;
}

#[async_trait]
impl<T: Collaborator + ?Sized> Collaborator for std::sync::Arc<T> {
    async fn generate_plan(&self, goal: &str) -> Result<TaskPlan, AiError> {
        (**self).generate_plan(goal).await
    }

    async fn chat(
        &self,
        user_message: &str,
        history: &[ChatTurn],
        context: Option<&PlanContext>,
    ) -> Result<String, AiError> {
        (**self).chat(user_message, history, context).await
    }

    async fn modify_tasks(
        &self,
        instruction: &str,
        tasks: &[Task],
        goal_title: &str,
    ) -> Result<Vec<Task>, AiError> {
        (**self).modify_tasks(instruction, tasks, goal_title).await
    }
}
