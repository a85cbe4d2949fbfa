//! Session controller: the single source of truth for the presentation
//! layer.
//!
//! Owns the signed-in user's chat list, the active chat view, and the
//! current task plan, and orchestrates the chat store and the AI
//! collaborator. One operation is in flight at a time; a second `send` or
//! `generate` while busy is rejected with [`SessionError::Busy`] instead of
//! relying on the UI to disable inputs.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use chrono::{DateTime, Utc};
use planner_core::models::{ChatSession, Message, Role, TaskPlan};

use crate::ai::{AiError, ChatTurn, Collaborator, PlanContext};
use crate::pdf;

pub mod intent;
pub mod sanitize;
pub mod store;

pub use intent::Intent;
pub use store::{AuthContext, ChatStore, HttpChatStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("another operation is already in flight")]
    Busy,
    #[error("no active chat")]
    NoActiveChat,
    #[error("no task plan to modify")]
    NoPlan,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ai(#[from] AiError),
}

/// A message as held in the active chat view. Optimistic sends start out
/// `Pending` under a local correlation id and are either confirmed with the
/// store-assigned message or left as a visible `Failed` marker; they are
/// never silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalMessage {
    Pending {
        correlation_id: u64,
        role: Role,
        content: String,
        at: DateTime<Utc>,
    },
    Confirmed(Message),
    Failed {
        correlation_id: u64,
        role: Role,
        content: String,
        at: DateTime<Utc>,
    },
}

impl LocalMessage {
    pub fn role(&self) -> Role {
        match self {
            Self::Pending { role, .. } | Self::Failed { role, .. } => *role,
            Self::Confirmed(message) => message.role,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Pending { content, .. } | Self::Failed { content, .. } => content,
            Self::Confirmed(message) => &message.content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A transient user-visible notification, drained by the presentation layer.
#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct ActiveChat {
    pub id: Uuid,
    pub messages: Vec<LocalMessage>,
}

pub struct SessionController<S, A> {
    store: S,
    ai: A,
    ctx: AuthContext,
    chats: Vec<ChatSession>,
    active: Option<ActiveChat>,
    plan: Option<TaskPlan>,
    busy: bool,
    focus_requests: u64,
    correlation_counter: u64,
    notices: Vec<Notice>,
    export_dir: PathBuf,
}

impl<S: ChatStore, A: Collaborator> SessionController<S, A> {
    pub fn new(store: S, ai: A, ctx: AuthContext) -> Self {
        Self {
            store,
            ai,
            ctx,
            chats: Vec::new(),
            active: None,
            plan: None,
            busy: false,
            focus_requests: 0,
            correlation_counter: 0,
            notices: Vec::new(),
            export_dir: std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir()),
        }
    }

    /// Directory PDF exports are written to first (temp dir by default).
    pub fn set_export_dir(&mut self, dir: PathBuf) {
        self.export_dir = dir;
    }

    pub fn user(&self) -> &planner_core::models::User {
        &self.ctx.user
    }

    pub fn chats(&self) -> &[ChatSession] {
        &self.chats
    }

    pub fn active_chat(&self) -> Option<&ActiveChat> {
        self.active.as_ref()
    }

    pub fn plan(&self) -> Option<&TaskPlan> {
        self.plan.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Monotonic counter the presentation layer watches to move input focus.
    pub fn focus_requests(&self) -> u64 {
        self.focus_requests
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Loads the chat list and guarantees an active chat: selects the most
    /// recently updated one, or creates a fresh chat when the user has none.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        self.chats = self.store.list_chats(&self.ctx).await?;
        match self.chats.first() {
            Some(chat) => {
                self.active = Some(ActiveChat {
                    id: chat.id,
                    messages: chat.messages.iter().cloned().map(LocalMessage::Confirmed).collect(),
                });
                self.focus_requests += 1;
                Ok(())
            }
            None => self.new_chat().await,
        }
    }

    pub async fn new_chat(&mut self) -> Result<(), SessionError> {
        let chat = self.store.create_chat(&self.ctx).await?;
        self.active = Some(ActiveChat {
            id: chat.id,
            messages: Vec::new(),
        });
        self.chats.insert(0, chat);
        self.plan = None;
        self.focus_requests += 1;
        Ok(())
    }

    /// Switches the active chat. The task plan is intentionally not
    /// restored: plans are not persisted per chat, so switching always
    /// starts with an empty task panel.
    pub async fn select_chat(&mut self, chat_id: Uuid) -> Result<(), SessionError> {
        let messages = self.store.list_messages(&self.ctx, chat_id).await?;
        self.active = Some(ActiveChat {
            id: chat_id,
            messages: messages.into_iter().map(LocalMessage::Confirmed).collect(),
        });
        self.plan = None;
        self.focus_requests += 1;
        Ok(())
    }

    /// Deletes a chat. When it was the active one, the newest remaining chat
    /// takes over (its messages are re-fetched) and the plan is cleared.
    pub async fn delete_chat(&mut self, chat_id: Uuid) -> Result<(), SessionError> {
        self.store.delete_chat(&self.ctx, chat_id).await?;
        self.chats.retain(|c| c.id != chat_id);

        if self.active.as_ref().is_some_and(|a| a.id == chat_id) {
            self.active = match self.chats.first() {
                Some(head) => {
                    let id = head.id;
                    let messages = self.store.list_messages(&self.ctx, id).await?;
                    Some(ActiveChat {
                        id,
                        messages: messages.into_iter().map(LocalMessage::Confirmed).collect(),
                    })
                }
                None => None,
            };
            self.plan = None;
        }
        Ok(())
    }

    /// The main state-machine step: optimistic append, persist, classify,
    /// then either plan generation or a sanitized chat reply.
    pub async fn send_message(&mut self, content: &str) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        let chat_id = self.active.as_ref().map(|a| a.id).ok_or(SessionError::NoActiveChat)?;

        self.busy = true;
        let result = self.send_message_inner(chat_id, content).await;
        self.busy = false;

        if let Err(err) = &result {
            self.push_notice(NoticeKind::Error, "Error", err.to_string());
        }
        result
    }

    async fn send_message_inner(
        &mut self,
        chat_id: Uuid,
        content: &str,
    ) -> Result<(), SessionError> {
        // History snapshot excludes the message being sent.
        let history: Vec<ChatTurn> = self
            .active
            .as_ref()
            .map(|active| {
                active
                    .messages
                    .iter()
                    .filter_map(|m| match m {
                        LocalMessage::Confirmed(msg) => Some(ChatTurn {
                            role: msg.role,
                            content: msg.content.clone(),
                        }),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let correlation_id = self.next_correlation_id();
        self.push_local(LocalMessage::Pending {
            correlation_id,
            role: Role::User,
            content: content.to_string(),
            at: Utc::now(),
        });

        let user_message = match self
            .store
            .append_message(&self.ctx, chat_id, Role::User, content)
            .await
        {
            Ok(message) => message,
            Err(err) => {
                self.mark_failed(correlation_id);
                return Err(err.into());
            }
        };
        self.confirm(correlation_id, user_message);

        let message_intent = intent::classify(content);
        match message_intent {
            Intent::Generate => {
                let plan = self.ai.generate_plan(content).await?;
                let ack = plan_acknowledgment(&plan);
                let assistant = self
                    .store
                    .append_message(&self.ctx, chat_id, Role::Assistant, &ack)
                    .await?;
                self.push_local(LocalMessage::Confirmed(assistant));
                self.plan = Some(plan);
            }
            _ => {
                let context = self.plan.as_ref().map(|p| PlanContext {
                    goal_title: p.goal_title.clone(),
                    tasks: p.tasks.clone(),
                });
                let reply = self.ai.chat(content, &history, context.as_ref()).await?;
                let text = if message_intent == Intent::None {
                    sanitize::sanitize_reply(&reply)
                } else {
                    reply
                };
                let assistant = self
                    .store
                    .append_message(&self.ctx, chat_id, Role::Assistant, &text)
                    .await?;
                self.push_local(LocalMessage::Confirmed(assistant));
            }
        }

        self.refresh_chats().await?;
        Ok(())
    }

    /// Explicit plan generation from the UI, distinct from chat-based
    /// generation: no optimistic message, and the result is exported to PDF
    /// right away.
    pub async fn generate_plan(&mut self, goal: &str) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        let chat_id = self.active.as_ref().map(|a| a.id).ok_or(SessionError::NoActiveChat)?;

        self.busy = true;
        let result = self.generate_plan_inner(chat_id, goal).await;
        self.busy = false;

        if let Err(err) = &result {
            self.push_notice(NoticeKind::Error, "Error", err.to_string());
        }
        result
    }

    async fn generate_plan_inner(&mut self, chat_id: Uuid, goal: &str) -> Result<(), SessionError> {
        let plan = self.ai.generate_plan(goal).await?;
        let ack = plan_acknowledgment(&plan);
        let assistant = self
            .store
            .append_message(&self.ctx, chat_id, Role::Assistant, &ack)
            .await?;
        self.push_local(LocalMessage::Confirmed(assistant));

        match pdf::render(&plan.tasks, &plan.goal_title)
            .and_then(|bytes| pdf::deliver(&bytes, &self.export_dir))
        {
            Ok(path) => self.push_notice(
                NoticeKind::Info,
                "PDF generated",
                format!("Your task plan was written to {}", path.display()),
            ),
            Err(err) => {
                self.push_notice(NoticeKind::Error, "Export failed", err.to_string());
            }
        }

        self.plan = Some(plan);
        self.refresh_chats().await?;
        Ok(())
    }

    /// Asks the collaborator to edit the current tasks; the returned array
    /// replaces the plan's tasks wholesale.
    pub async fn modify_plan(&mut self, instruction: &str) -> Result<(), SessionError> {
        if self.busy {
            return Err(SessionError::Busy);
        }
        let plan = self.plan.clone().ok_or(SessionError::NoPlan)?;

        self.busy = true;
        let outcome = self
            .ai
            .modify_tasks(instruction, &plan.tasks, &plan.goal_title)
            .await;
        self.busy = false;

        match outcome {
            Ok(tasks) => {
                if let Some(current) = &mut self.plan {
                    current.tasks = tasks;
                }
                Ok(())
            }
            Err(err) => {
                self.push_notice(NoticeKind::Error, "Error", err.to_string());
                Err(err.into())
            }
        }
    }

    /// Sign-out: the context is dropped with the controller.
    pub fn into_auth_context(self) -> AuthContext {
        self.ctx
    }

    async fn refresh_chats(&mut self) -> Result<(), SessionError> {
        self.chats = self.store.list_chats(&self.ctx).await?;
        Ok(())
    }

    fn next_correlation_id(&mut self) -> u64 {
        self.correlation_counter += 1;
        self.correlation_counter
    }

    fn push_local(&mut self, message: LocalMessage) {
        if let Some(active) = &mut self.active {
            active.messages.push(message);
        }
    }

    fn confirm(&mut self, correlation_id: u64, message: Message) {
        if let Some(active) = &mut self.active {
            for local in &mut active.messages {
                if matches!(local, LocalMessage::Pending { correlation_id: id, .. } if *id == correlation_id)
                {
                    *local = LocalMessage::Confirmed(message);
                    return;
                }
            }
        }
    }

    fn mark_failed(&mut self, correlation_id: u64) {
        if let Some(active) = &mut self.active {
            for local in &mut active.messages {
                if let LocalMessage::Pending {
                    correlation_id: id,
                    role,
                    content,
                    at,
                } = local
                {
                    if *id == correlation_id {
                        *local = LocalMessage::Failed {
                            correlation_id: *id,
                            role: *role,
                            content: content.clone(),
                            at: *at,
                        };
                        return;
                    }
                }
            }
        }
    }

    fn push_notice(&mut self, kind: NoticeKind, title: &str, detail: String) {
        self.notices.push(Notice {
            kind,
            title: title.to_string(),
            detail,
        });
    }
}

fn plan_acknowledgment(plan: &TaskPlan) -> String {
    format!(
        "I've created a task plan for \"{}\" with {} tasks.",
        plan.goal_title,
        plan.tasks.len()
    )
}
