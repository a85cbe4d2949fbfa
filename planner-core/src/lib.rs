//! Core library for Smart Task Planner.
//!
//! This crate provides the domain models and database operations for the
//! planner backend, independent of any transport layer (HTTP, CLI, etc.).
//!
//! # Usage
//!
//! ```no_run
//! use planner_core::db::Database;
//! use planner_core::models::*;
//!
//! let db = Database::open_default()?;
//! db.migrate()?;
//!
//! let chats = db.list_chats(uuid::Uuid::new_v4())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod db;
pub mod models;

// Re-export commonly used types at crate root
pub use db::Database;
