//! Remote Board Gateway: request/response access to the persistence API.
//!
//! The gateway holds no board state. [`BoardGateway`] is the seam the board
//! store talks through; [`WorkspaceGateway`] covers board management and user
//! lookup. Real implementation: [`HttpGateway`]. Test double and offline
//! backend: [`InMemoryGateway`].

pub mod auth;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use boardsync_common::{
    Board, BoardId, Column, ColumnId, ColumnPosition, Task, TaskId, User, UserId, Visibility,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;

pub use auth::AuthClient;
pub use http::HttpGateway;
pub use memory::{GatewayCall, InMemoryGateway};

/// Body of `POST /column`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewColumn {
    pub board_id: BoardId,
    pub title: String,
    pub position: u32,
}

/// Body of `PATCH /column/columns/move`. `all_columns` is the full
/// client-declared order the server resolves collisions with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMove {
    pub board_id: BoardId,
    pub column_id: ColumnId,
    pub new_position: u32,
    pub all_columns: Vec<ColumnPosition>,
}

/// Body of `POST /task`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub column_id: ColumnId,
    pub title: String,
    pub position: u32,
}

/// Body of `PUT /task/{id}`: a full overwrite. Every key is always present;
/// a cleared due date goes out as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub attachments: Vec<String>,
    pub column_id: ColumnId,
    pub position: u32,
}

impl TaskUpdate {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            tags: task.tags.clone(),
            due_date: task.due_date,
            attachments: task.attachments.clone(),
            column_id: task.column_id.clone(),
            position: task.position,
        }
    }
}

/// Response of the column listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoardColumns {
    pub board_title: Option<String>,
    pub columns: Vec<Column>,
}

/// Body of board create/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

/// Operations the board store needs.
#[async_trait]
pub trait BoardGateway: Send + Sync {
    async fn fetch_columns(&self, board_id: &BoardId) -> Result<BoardColumns, GatewayError>;

    async fn create_column(&self, column: &NewColumn) -> Result<Column, GatewayError>;

    async fn rename_column(&self, column_id: &ColumnId, title: &str) -> Result<(), GatewayError>;

    async fn move_columns(&self, request: &ColumnMove) -> Result<(), GatewayError>;

    async fn create_task(&self, task: &NewTask) -> Result<Task, GatewayError>;

    async fn update_task(&self, task_id: &TaskId, update: &TaskUpdate)
    -> Result<Task, GatewayError>;
}

/// Board management and user lookup.
#[async_trait]
pub trait WorkspaceGateway: Send + Sync {
    async fn create_board(&self, board: &BoardDraft) -> Result<Board, GatewayError>;

    /// Boards the current user owns.
    async fn my_boards(&self) -> Result<Vec<Board>, GatewayError>;

    /// Boards the current user owns or was added to.
    async fn all_boards(&self) -> Result<Vec<Board>, GatewayError>;

    async fn update_board(
        &self,
        board_id: &BoardId,
        board: &BoardDraft,
    ) -> Result<Board, GatewayError>;

    async fn add_member(&self, board_id: &BoardId, member_id: &UserId) -> Result<(), GatewayError>;

    async fn board_members(&self, board_id: &BoardId) -> Result<Vec<User>, GatewayError>;

    async fn profile(&self) -> Result<User, GatewayError>;

    async fn search_users(&self, query: &str) -> Result<Vec<User>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_update_always_carries_due_date_key() {
        let task = Task::new(TaskId::from("t1"), ColumnId::from("c1"), "Ship", 0);
        let json = serde_json::to_value(TaskUpdate::from_task(&task)).unwrap();
        let object = json.as_object().unwrap();
        assert!(object.contains_key("dueDate"));
        assert!(json["dueDate"].is_null());
        assert_eq!(json["columnId"], "c1");
        assert_eq!(json["position"], 0);
    }

    #[test]
    fn column_move_uses_server_field_names() {
        let request = ColumnMove {
            board_id: BoardId::from("b1"),
            column_id: ColumnId::from("c2"),
            new_position: 0,
            all_columns: vec![ColumnPosition {
                id: ColumnId::from("c2"),
                position: 0,
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["boardId"], "b1");
        assert_eq!(json["columnId"], "c2");
        assert_eq!(json["newPosition"], 0);
        assert_eq!(json["allColumns"][0]["position"], 0);
    }
}
