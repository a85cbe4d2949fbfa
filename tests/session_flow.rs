//! End-to-end flow: a real HTTP server on an ephemeral port, the HTTP chat
//! store client against it, and the session controller on top with a stubbed
//! AI collaborator.

use std::future::IntoFuture;
use std::sync::Mutex;

use async_trait::async_trait;

use planner_core::models::{Priority, Task, TaskPlan, TaskStatus};
use planner_core::Database;
use smart_task_planner::ai::{AiError, ChatTurn, Collaborator, PlanContext};
use smart_task_planner::api::create_router;
use smart_task_planner::session::{
    AuthContext, ChatStore, HttpChatStore, SessionController, StoreError,
};

async fn spawn_server() -> String {
    let db = Database::open_in_memory().unwrap();
    db.migrate().unwrap();
    let app = create_router(db);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(axum::serve(listener, app).into_future());
    format!("http://{addr}")
}

struct StubAi {
    plan: TaskPlan,
    reply: Mutex<String>,
}

impl StubAi {
    fn new() -> Self {
        let tasks = (1..=3)
            .map(|n| Task {
                id: format!("task-{n}"),
                title: format!("Step {n}"),
                description: Some("Practice daily".to_string()),
                deadline: Some(format!("Week {n}")),
                priority: Priority::Medium,
                category: Some("Music".to_string()),
                dependencies: vec![],
                status: TaskStatus::Pending,
            })
            .collect();
        Self {
            plan: TaskPlan {
                goal_title: "Learn Piano".to_string(),
                tasks,
            },
            reply: Mutex::new("Happy to help!".to_string()),
        }
    }
}

#[async_trait]
impl Collaborator for StubAi {
    async fn generate_plan(&self, _goal: &str) -> Result<TaskPlan, AiError> {
        Ok(self.plan.clone())
    }

    async fn chat(
        &self,
        _user_message: &str,
        _history: &[ChatTurn],
        _context: Option<&PlanContext>,
    ) -> Result<String, AiError> {
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn modify_tasks(
        &self,
        _instruction: &str,
        tasks: &[Task],
        _goal_title: &str,
    ) -> Result<Vec<Task>, AiError> {
        let mut tasks = tasks.to_vec();
        for task in &mut tasks {
            task.priority = Priority::High;
        }
        Ok(tasks)
    }
}

#[tokio::test]
async fn full_session_over_http() {
    let base_url = spawn_server().await;
    let store = HttpChatStore::new(&base_url).unwrap();
    let ctx = store
        .sign_up("ada@example.com", "hunter2", "Ada")
        .await
        .unwrap();
    assert_eq!(ctx.user.email, "ada@example.com");

    let mut session = SessionController::new(store, StubAi::new(), ctx);
    session.initialize().await.unwrap();
    assert_eq!(session.chats().len(), 1);
    assert!(session.active_chat().is_some());

    // Plain chat turn.
    session.send_message("hello there").await.unwrap();
    let active = session.active_chat().unwrap();
    assert_eq!(active.messages.len(), 2);
    assert_eq!(active.messages[1].content(), "Happy to help!");

    // Plan generation turn.
    session
        .send_message("generate a plan to learn piano")
        .await
        .unwrap();
    let plan = session.plan().unwrap();
    assert_eq!(plan.goal_title, "Learn Piano");
    assert_eq!(plan.tasks.len(), 3);
    let active = session.active_chat().unwrap();
    assert!(active
        .messages
        .last()
        .unwrap()
        .content()
        .contains("I've created a task plan for \"Learn Piano\" with 3 tasks."));

    // Plan modification keeps the same tasks, reprioritized by the stub.
    session.modify_plan("make everything urgent").await.unwrap();
    assert!(session
        .plan()
        .unwrap()
        .tasks
        .iter()
        .all(|t| t.priority == Priority::High));

    // A second client sees the persisted conversation after re-login.
    let store = HttpChatStore::new(&base_url).unwrap();
    let ctx = store.sign_in("ada@example.com", "hunter2").await.unwrap();
    let mut session = SessionController::new(store, StubAi::new(), ctx);
    session.initialize().await.unwrap();
    let active = session.active_chat().unwrap();
    assert_eq!(active.messages.len(), 4);
    // The plan itself is ephemeral and does not survive the session.
    assert!(session.plan().is_none());
}

#[tokio::test]
async fn switching_and_deleting_chats_over_http() {
    let base_url = spawn_server().await;
    let store = HttpChatStore::new(&base_url).unwrap();
    let ctx = store.sign_up("bob@example.com", "pw12345", "Bob").await.unwrap();

    let mut session = SessionController::new(store, StubAi::new(), ctx);
    session.initialize().await.unwrap();
    let first = session.active_chat().unwrap().id;
    session.send_message("remember this one").await.unwrap();

    session.new_chat().await.unwrap();
    let second = session.active_chat().unwrap().id;
    assert_ne!(first, second);
    assert_eq!(session.chats().len(), 2);

    session.select_chat(first).await.unwrap();
    assert_eq!(session.active_chat().unwrap().messages.len(), 2);

    session.delete_chat(first).await.unwrap();
    assert_eq!(session.chats().len(), 1);
    assert_eq!(session.active_chat().unwrap().id, second);
}

#[tokio::test]
async fn http_store_maps_error_statuses() {
    let base_url = spawn_server().await;
    let store = HttpChatStore::new(&base_url).unwrap();
    let ada = store.sign_up("ada@example.com", "hunter2", "Ada").await.unwrap();
    let eve = store.sign_up("eve@example.com", "hunter2", "Eve").await.unwrap();

    let chat = store.create_chat(&ada).await.unwrap();

    let err = store.list_messages(&eve, chat.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Forbidden));

    let err = store
        .list_messages(&ada, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));

    let bad_token = AuthContext {
        token: "bogus".to_string(),
        user: ada.user.clone(),
    };
    let err = store.list_chats(&bad_token).await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));

    let err = store
        .append_message(&ada, chat.id, planner_core::models::Role::User, "  ")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::BadRequest(_)));
}

#[tokio::test]
async fn sign_in_with_wrong_password_fails() {
    let base_url = spawn_server().await;
    let store = HttpChatStore::new(&base_url).unwrap();
    store.sign_up("ada@example.com", "hunter2", "Ada").await.unwrap();

    let err = store.sign_in("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, StoreError::Unauthorized));
}
