//! Shared domain types for boardsync.
//!
//! These are the wire shapes the persistence API and the realtime channel
//! exchange: boards, columns, tasks, users, and the tagged content-update
//! payloads that describe a single board mutation.

pub mod content;
pub mod ids;
pub mod models;

pub use content::{BoardContent, ColumnPosition, RemoteMutation};
pub use ids::{BoardId, ColumnId, TaskId, UserId};
pub use models::{Board, Column, ParseValueError, Task, User, Visibility};
