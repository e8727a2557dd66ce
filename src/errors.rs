//! Typed error hierarchy for boardsync.
//!
//! Three top-level enums cover the three subsystems:
//! - `GatewayError`: a single request to the persistence API failed
//! - `SyncError`: board store and task editor failures (load, mutation and validation)
//! - `ChannelError`: realtime connection failures

use boardsync_common::{BoardId, ColumnId, TaskId};
use thiserror::Error;

/// Errors from one round trip to the persistence API.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request to {path} timed out")]
    Timeout { path: String },

    #[error("Request to {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{path} returned HTTP {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    #[error("Failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors surfaced by the board store and the task editor.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The board could not be fetched; it stays unusable until retried.
    #[error("Failed to load board {board_id}: {source}")]
    Load {
        board_id: BoardId,
        #[source]
        source: GatewayError,
    },

    /// A create/update/move was rejected; local state is reconciled by reload.
    #[error("{operation} failed: {source}")]
    Mutation {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },

    /// Refused locally; no request was made.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No board is loaded")]
    NotLoaded,

    #[error("Column {0} not found")]
    UnknownColumn(ColumnId),

    #[error("Task {0} not found")]
    UnknownTask(TaskId),
}

/// Errors from the realtime channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid realtime URL '{0}'")]
    InvalidUrl(String),

    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
