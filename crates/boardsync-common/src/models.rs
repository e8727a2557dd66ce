use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::ids::{BoardId, ColumnId, TaskId, UserId};

/// A string that does not name any variant of a closed value set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseValueError {
    pub kind: &'static str,
    pub value: String,
}

/// Reads an explicit `null` list the same as a missing one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    #[default]
    Workspace,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Workspace => "workspace",
            Self::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "workspace" => Ok(Self::Workspace),
            "public" => Ok(Self::Public),
            _ => Err(ParseValueError {
                kind: "visibility",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(rename = "_id", alias = "id")]
    pub id: BoardId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

/// A lane of the board. `tasks` arrives populated from the column listing
/// (older server revisions call the field `taskId`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(rename = "_id", alias = "id")]
    pub id: ColumnId,
    #[serde(default)]
    pub board_id: BoardId,
    pub title: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default, alias = "taskId", deserialize_with = "null_as_empty")]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id", alias = "id")]
    pub id: TaskId,
    #[serde(default)]
    pub column_id: ColumnId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub position: u32,
}

impl Task {
    /// A task as it exists right after "add card": no description, tags,
    /// attachments or due date.
    pub fn new(id: TaskId, column_id: ColumnId, title: impl Into<String>, position: u32) -> Self {
        Self {
            id,
            column_id,
            title: title.into(),
            description: None,
            due_date: None,
            tags: Vec::new(),
            attachments: Vec::new(),
            position,
        }
    }
}

/// A user as returned by profile lookup, member listing and user search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub email: String,
}
