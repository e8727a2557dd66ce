//! Board mutation payloads exchanged over the realtime channel.
//!
//! `BoardContent` is what a client publishes inside a `boardContentUpdate`
//! event after the server confirmed a local mutation. `RemoteMutation` is the
//! closed set of structural changes a peer can push into the local store;
//! every inbound discriminator maps onto exactly one variant.

use serde::{Deserialize, Serialize};

use crate::ids::{ColumnId, TaskId};
use crate::models::{Column, Task};

/// One entry of the client-declared column order sent with a reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPosition {
    pub id: ColumnId,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BoardContent {
    ColumnCreated {
        column: Column,
    },
    ColumnTitleChanged {
        column_id: ColumnId,
        title: String,
    },
    ColumnsReordered {
        column_id: ColumnId,
        new_position: u32,
        all_columns: Vec<ColumnPosition>,
    },
    TaskCreated {
        task: Task,
    },
    TaskUpdated {
        task: Task,
    },
    TaskMoved {
        task_id: TaskId,
        source_column_id: ColumnId,
        destination_column_id: ColumnId,
        position: u32,
    },
}

impl BoardContent {
    /// The discriminator string carried in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ColumnCreated { .. } => "columnCreated",
            Self::ColumnTitleChanged { .. } => "columnTitleChanged",
            Self::ColumnsReordered { .. } => "columnsReordered",
            Self::TaskCreated { .. } => "taskCreated",
            Self::TaskUpdated { .. } => "taskUpdated",
            Self::TaskMoved { .. } => "taskMoved",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteMutation {
    ColumnCreated(Column),
    ColumnUpdated {
        column_id: ColumnId,
        title: Option<String>,
    },
    ColumnDeleted {
        column_id: ColumnId,
    },
    ColumnsReordered {
        order: Vec<ColumnPosition>,
    },
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskMoved {
        task_id: TaskId,
        destination_column_id: ColumnId,
        position: u32,
    },
    TaskDeleted {
        task_id: TaskId,
    },
}

impl RemoteMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ColumnCreated(_) => "columnCreated",
            Self::ColumnUpdated { .. } => "columnUpdated",
            Self::ColumnDeleted { .. } => "columnDeleted",
            Self::ColumnsReordered { .. } => "columnsReordered",
            Self::TaskCreated(_) => "taskCreated",
            Self::TaskUpdated(_) => "taskUpdated",
            Self::TaskMoved { .. } => "taskMoved",
            Self::TaskDeleted { .. } => "taskDeleted",
        }
    }
}

impl From<BoardContent> for RemoteMutation {
    fn from(content: BoardContent) -> Self {
        match content {
            BoardContent::ColumnCreated { column } => Self::ColumnCreated(column),
            BoardContent::ColumnTitleChanged { column_id, title } => Self::ColumnUpdated {
                column_id,
                title: Some(title),
            },
            BoardContent::ColumnsReordered { all_columns, .. } => Self::ColumnsReordered {
                order: all_columns,
            },
            BoardContent::TaskCreated { task } => Self::TaskCreated(task),
            BoardContent::TaskUpdated { task } => Self::TaskUpdated(task),
            BoardContent::TaskMoved {
                task_id,
                destination_column_id,
                position,
                ..
            } => Self::TaskMoved {
                task_id,
                destination_column_id,
                position,
            },
        }
    }
}
