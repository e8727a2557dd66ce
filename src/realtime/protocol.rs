use boardsync_common::{BoardContent, BoardId, Column, ColumnId, RemoteMutation, Task, TaskId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Frame envelopes ──────────────────────────────────────────────────
//
// Every frame is a JSON text message `{"event": "<name>", "data": {...}}`.

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    JoinBoard {
        board_id: BoardId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<UserId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
    },
    LeaveBoard {
        board_id: BoardId,
    },
    BoardContentUpdate {
        board_id: BoardId,
        content: BoardContent,
        last_modified: DateTime<Utc>,
    },
    CursorMove {
        board_id: BoardId,
        x: f64,
        y: f64,
    },
}

/// Frames the server pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerFrame {
    UserActive {
        user_id: UserId,
        #[serde(default)]
        user_name: String,
    },
    UserOnline {
        user_id: UserId,
        #[serde(default)]
        user_name: String,
    },
    UserLeft {
        user_id: UserId,
    },
    UserOffline {
        user_id: UserId,
    },
    UserCursorMoved {
        user_id: UserId,
        x: f64,
        y: f64,
    },
    BoardContentUpdated {
        #[serde(default)]
        board_id: BoardId,
        content: BoardContent,
        #[serde(default)]
        last_modified: Option<DateTime<Utc>>,
    },
    ColumnCreated {
        column: Column,
    },
    ColumnUpdated {
        column_id: ColumnId,
        #[serde(default)]
        title: Option<String>,
    },
    ColumnDeleted {
        column_id: ColumnId,
    },
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    TaskMoved {
        task_id: TaskId,
        destination_column_id: ColumnId,
        #[serde(default)]
        position: u32,
    },
    TaskDeleted {
        task_id: TaskId,
    },
}

/// A server frame reduced to what the channel acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Arrived { user_id: UserId, user_name: String },
    Departed { user_id: UserId },
    Cursor { user_id: UserId, x: f64, y: f64 },
    /// `board_id` is empty when the frame did not name a board.
    Mutation {
        board_id: BoardId,
        mutation: RemoteMutation,
    },
}

impl ServerFrame {
    pub fn into_inbound(self) -> Inbound {
        let mutation = |mutation| Inbound::Mutation {
            board_id: BoardId::default(),
            mutation,
        };
        match self {
            Self::UserActive { user_id, user_name } | Self::UserOnline { user_id, user_name } => {
                Inbound::Arrived { user_id, user_name }
            }
            Self::UserLeft { user_id } | Self::UserOffline { user_id } => {
                Inbound::Departed { user_id }
            }
            Self::UserCursorMoved { user_id, x, y } => Inbound::Cursor { user_id, x, y },
            Self::BoardContentUpdated {
                board_id, content, ..
            } => Inbound::Mutation {
                board_id,
                mutation: content.into(),
            },
            Self::ColumnCreated { column } => mutation(RemoteMutation::ColumnCreated(column)),
            Self::ColumnUpdated { column_id, title } => {
                mutation(RemoteMutation::ColumnUpdated { column_id, title })
            }
            Self::ColumnDeleted { column_id } => {
                mutation(RemoteMutation::ColumnDeleted { column_id })
            }
            Self::TaskCreated { task } => mutation(RemoteMutation::TaskCreated(task)),
            Self::TaskUpdated { task } => mutation(RemoteMutation::TaskUpdated(task)),
            Self::TaskMoved {
                task_id,
                destination_column_id,
                position,
            } => mutation(RemoteMutation::TaskMoved {
                task_id,
                destination_column_id,
                position,
            }),
            Self::TaskDeleted { task_id } => mutation(RemoteMutation::TaskDeleted { task_id }),
        }
    }
}
