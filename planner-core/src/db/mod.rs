use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::models::{ChatSession, CreateUserInput, Message, Role, User, UserRecord};

mod schema;

/// Handle to the planner database. Cheap to clone; all callers share one
/// connection behind a mutex, so every operation is a single lock scope.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_default() -> Result<Self> {
        let path = default_db_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Self::open(&path)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Cascade deletes rely on this pragma being set per connection.
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        tracing::debug!("running database migrations");
        self.with_conn(|conn| {
            conn.execute_batch(schema::SCHEMA)
                .context("failed to run migrations")
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database lock poisoned"))?;
        f(&conn)
    }

    // ---- users & tokens ----

    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            name: input.name,
            created_at: Utc::now(),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, password_salt, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.name,
                    input.password_salt,
                    input.password_hash,
                    user.created_at.to_rfc3339(),
                ],
            )
            .context("failed to insert user")?;
            Ok(())
        })?;
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, name, password_salt, password_hash, created_at
                     FROM users WHERE email = ?1",
                    params![email],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    },
                )
                .optional()?;
            match row {
                Some((id, email, name, salt, hash, created_at)) => Ok(Some(UserRecord {
                    user: User {
                        id: parse_uuid(&id)?,
                        email,
                        name,
                        created_at: parse_ts(&created_at)?,
                    },
                    password_salt: salt,
                    password_hash: hash,
                })),
                None => Ok(None),
            }
        })
    }

    pub fn create_token(&self, user_id: Uuid) -> Result<String> {
        let token = Uuid::new_v4().simple().to_string();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![token, user_id.to_string(), Utc::now().to_rfc3339()],
            )
            .context("failed to insert token")?;
            Ok(())
        })?;
        Ok(token)
    }

    pub fn find_user_by_token(&self, token: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT u.id, u.email, u.name, u.created_at
                     FROM auth_tokens t JOIN users u ON u.id = t.user_id
                     WHERE t.token = ?1",
                    params![token],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;
            match row {
                Some((id, email, name, created_at)) => Ok(Some(User {
                    id: parse_uuid(&id)?,
                    email,
                    name,
                    created_at: parse_ts(&created_at)?,
                })),
                None => Ok(None),
            }
        })
    }

    pub fn delete_token(&self, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
            Ok(n > 0)
        })
    }

    // ---- chats & messages ----

    /// Sessions owned by the user, most-recently-updated first, with their
    /// messages embedded in append order.
    pub fn list_chats(&self, user_id: Uuid) -> Result<Vec<ChatSession>> {
        let metas = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, created_at, updated_at FROM chats
                 WHERE user_id = ?1 ORDER BY updated_at DESC",
            )?;
            let rows = stmt.query_map(params![user_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            let mut metas = Vec::new();
            for row in rows {
                metas.push(row?);
            }
            Ok(metas)
        })?;

        let mut chats = Vec::with_capacity(metas.len());
        for (id, owner, created_at, updated_at) in metas {
            let id = parse_uuid(&id)?;
            chats.push(ChatSession {
                id,
                user_id: parse_uuid(&owner)?,
                messages: self.list_messages(id)?,
                created_at: parse_ts(&created_at)?,
                updated_at: parse_ts(&updated_at)?,
            });
        }
        Ok(chats)
    }

    pub fn create_chat(&self, user_id: Uuid) -> Result<ChatSession> {
        let now = Utc::now();
        let chat = ChatSession {
            id: Uuid::new_v4(),
            user_id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chats (id, user_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    chat.id.to_string(),
                    user_id.to_string(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .context("failed to insert chat")?;
            Ok(())
        })?;
        Ok(chat)
    }

    pub fn get_chat(&self, id: Uuid) -> Result<Option<ChatSession>> {
        let meta = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, created_at, updated_at FROM chats WHERE id = ?1",
                    params![id.to_string()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row)
        })?;
        match meta {
            Some((owner, created_at, updated_at)) => Ok(Some(ChatSession {
                id,
                user_id: parse_uuid(&owner)?,
                messages: self.list_messages(id)?,
                created_at: parse_ts(&created_at)?,
                updated_at: parse_ts(&updated_at)?,
            })),
            None => Ok(None),
        }
    }

    /// Messages in append order, never reordered.
    pub fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, role, content, created_at FROM messages
                 WHERE chat_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map(params![chat_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })?;

        let mut messages = Vec::with_capacity(rows.len());
        for (id, role, content, created_at) in rows {
            messages.push(Message {
                id: parse_uuid(&id)?,
                role: Role::from_str(&role)
                    .ok_or_else(|| anyhow!("unknown message role: {role}"))?,
                content,
                timestamp: parse_ts(&created_at)?,
            });
        }
        Ok(messages)
    }

    /// Appends a message and bumps the chat's `updated_at` in one lock scope.
    pub fn append_message(&self, chat_id: Uuid, role: Role, content: &str) -> Result<Message> {
        let message = Message {
            id: Uuid::new_v4(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, chat_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id.to_string(),
                    chat_id.to_string(),
                    role.as_str(),
                    message.content,
                    message.timestamp.to_rfc3339(),
                ],
            )
            .context("failed to insert message")?;
            conn.execute(
                "UPDATE chats SET updated_at = ?1 WHERE id = ?2",
                params![message.timestamp.to_rfc3339(), chat_id.to_string()],
            )
            .context("failed to touch chat")?;
            Ok(())
        })?;
        Ok(message)
    }

    /// Deletes a chat and, via `ON DELETE CASCADE`, all of its messages.
    /// Returns false when no such chat exists.
    pub fn delete_chat(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM chats WHERE id = ?1", params![id.to_string()])?;
            Ok(n > 0)
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("invalid uuid in database: {s}"))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp in database: {s}"))?
        .with_timezone(&Utc))
}

fn default_db_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("STP_DB_PATH") {
        return Ok(PathBuf::from(path));
    }
    let dirs = directories::ProjectDirs::from("", "", "smart-task-planner")
        .ok_or_else(|| anyhow!("could not determine data directory"))?;
    Ok(dirs.data_dir().join("planner.db"))
}
