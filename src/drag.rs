//! Drag-Reorder Engine: turns a finished drag gesture into a store call.

use std::fmt;
use std::str::FromStr;

use boardsync_common::{ColumnId, ParseValueError, TaskId};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::SyncError;
use crate::store::BoardStore;

/// The type tag registered on the drag source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragKind {
    Column,
    Task,
}

impl fmt::Display for DragKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column => write!(f, "column"),
            Self::Task => write!(f, "task"),
        }
    }
}

impl FromStr for DragKind {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "column" => Ok(Self::Column),
            "task" => Ok(Self::Task),
            _ => Err(ParseValueError {
                kind: "drag type",
                value: s.to_string(),
            }),
        }
    }
}

/// A slot in a drop container. For task drags the container is the column
/// id; for column drags it is the board lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragLocation {
    pub droppable_id: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragResult {
    #[serde(rename = "type")]
    pub kind: DragKind,
    pub draggable_id: String,
    pub source: DragLocation,
    /// `None` when the drag was dropped outside any container.
    #[serde(default)]
    pub destination: Option<DragLocation>,
}

#[derive(Debug)]
pub enum DragOutcome {
    Cancelled,
    /// Dropped where it started; the store was not touched.
    Unchanged,
    ColumnMoved(JoinHandle<()>),
    TaskMoved(JoinHandle<()>),
    /// The dragged element is not on the local board. A reload was requested.
    Stale,
}

impl DragOutcome {
    /// The background persist of a successful move.
    pub fn into_handle(self) -> Option<JoinHandle<()>> {
        match self {
            Self::ColumnMoved(handle) | Self::TaskMoved(handle) => Some(handle),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct DragReorderEngine {
    store: BoardStore,
}

impl DragReorderEngine {
    pub fn new(store: BoardStore) -> Self {
        Self { store }
    }

    pub fn on_drag_end(&self, result: &DragResult) -> DragOutcome {
        let Some(destination) = &result.destination else {
            debug!(id = %result.draggable_id, "drag cancelled");
            return DragOutcome::Cancelled;
        };
        if destination == &result.source {
            return DragOutcome::Unchanged;
        }

        let moved = match result.kind {
            DragKind::Column => self
                .store
                .move_column(&ColumnId::new(&result.draggable_id), destination.index)
                .map(DragOutcome::ColumnMoved),
            // Same-column reorders go through the same call with an explicit
            // destination column.
            DragKind::Task => self
                .store
                .move_task(
                    &TaskId::new(&result.draggable_id),
                    &ColumnId::new(&result.source.droppable_id),
                    &ColumnId::new(&destination.droppable_id),
                    destination.index,
                )
                .map(DragOutcome::TaskMoved),
        };

        // Local moves clamp their index, so they only fail on a board that is
        // missing or lacks the dragged element.
        match moved {
            Ok(outcome) => outcome,
            Err(e) => self.stale(result, e),
        }
    }

    fn stale(&self, result: &DragResult, error: SyncError) -> DragOutcome {
        warn!(
            kind = %result.kind,
            id = %result.draggable_id,
            error = %error,
            "drag refers to state the board does not hold; reloading"
        );
        self.store.request_reload();
        DragOutcome::Stale
    }
}
