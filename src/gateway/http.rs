//! reqwest-backed gateway for the JSON persistence API.

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use boardsync_common::{Board, BoardId, Column, ColumnId, Task, TaskId, User, UserId};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BoardColumns, BoardDraft, BoardGateway, ColumnMove, NewColumn, NewTask, TaskUpdate, WorkspaceGateway};
use crate::config::ApiConfig;
use crate::errors::GatewayError;

// ── Response envelopes ───────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnsPayload {
    Envelope {
        columns: Vec<Column>,
        #[serde(default, rename = "boardTitle")]
        board_title: Option<String>,
    },
    Bare(Vec<Column>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColumnPayload {
    Envelope { column: Column },
    Bare(Column),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskPayload {
    Envelope { task: Task },
    Bare(Task),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoardPayload {
    Envelope { board: Board },
    Bare(Board),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoardsPayload {
    Envelope { boards: Vec<Board> },
    Bare(Vec<Board>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserPayload {
    Envelope { user: User },
    Bare(User),
}

#[derive(Deserialize)]
struct MembersPayload {
    #[serde(default)]
    members: Vec<User>,
}

#[derive(Deserialize)]
struct UsersPayload {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberRequest<'a> {
    member_id: &'a UserId,
}

#[derive(Serialize)]
struct RenameRequest<'a> {
    title: &'a str,
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTP gateway. Clones share the connection pool and the bearer token.
#[derive(Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl HttpGateway {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            "boardsync/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(config.token.clone())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token used for subsequent requests.
    pub fn set_token(&self, token: Option<String>) {
        let mut slot = self.token.write().unwrap_or_else(|e| e.into_inner());
        *slot = token;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .map(|t| t.is_some())
            .unwrap_or_else(|e| e.into_inner().is_some())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        let token = self.token.read().unwrap_or_else(|e| e.into_inner());
        match token.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(&self, builder: RequestBuilder, path: &str) -> Result<Vec<u8>, GatewayError> {
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(path, e))?;
        debug!(path, status = status.as_u16(), bytes = body.len(), "gateway response");

        if !status.is_success() {
            return Err(GatewayError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(body.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        path: &str,
    ) -> Result<T, GatewayError> {
        let body = self.execute(builder, path).await?;
        serde_json::from_slice(&body).map_err(|e| GatewayError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn send_empty(&self, builder: RequestBuilder, path: &str) -> Result<(), GatewayError> {
        self.execute(builder, path).await.map(|_| ())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        self.send_json(self.request(Method::GET, path), path).await
    }

    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send_json(self.request(Method::POST, path).json(body), path)
            .await
    }

    pub(crate) async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send_json(self.request(Method::PUT, path).json(body), path)
            .await
    }

    pub(crate) async fn patch_empty<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), GatewayError> {
        self.send_empty(self.request(Method::PATCH, path).json(body), path)
            .await
    }
}

fn transport_error(path: &str, source: reqwest::Error) -> GatewayError {
    if source.is_timeout() {
        GatewayError::Timeout {
            path: path.to_string(),
        }
    } else {
        GatewayError::Transport {
            path: path.to_string(),
            source,
        }
    }
}

/// Pull a human message out of an error body (`{"message": ..}` or
/// `{"error": ..}`), falling back to the raw text.
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    text.chars().take(200).collect()
}

#[async_trait]
impl BoardGateway for HttpGateway {
    async fn fetch_columns(&self, board_id: &BoardId) -> Result<BoardColumns, GatewayError> {
        let path = format!("/column/get-all/{}", board_id);
        let payload: ColumnsPayload = self.get(&path).await?;
        Ok(match payload {
            ColumnsPayload::Envelope {
                columns,
                board_title,
            } => BoardColumns {
                board_title,
                columns,
            },
            ColumnsPayload::Bare(columns) => BoardColumns {
                board_title: None,
                columns,
            },
        })
    }

    async fn create_column(&self, column: &NewColumn) -> Result<Column, GatewayError> {
        let payload: ColumnPayload = self.post("/column", column).await?;
        Ok(match payload {
            ColumnPayload::Envelope { column } | ColumnPayload::Bare(column) => column,
        })
    }

    async fn rename_column(&self, column_id: &ColumnId, title: &str) -> Result<(), GatewayError> {
        let path = format!("/column/{}", column_id);
        self.patch_empty(&path, &RenameRequest { title }).await
    }

    async fn move_columns(&self, request: &ColumnMove) -> Result<(), GatewayError> {
        self.patch_empty("/column/columns/move", request).await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, GatewayError> {
        let payload: TaskPayload = self.post("/task", task).await?;
        Ok(match payload {
            TaskPayload::Envelope { task } | TaskPayload::Bare(task) => task,
        })
    }

    async fn update_task(
        &self,
        task_id: &TaskId,
        update: &TaskUpdate,
    ) -> Result<Task, GatewayError> {
        let path = format!("/task/{}", task_id);
        let payload: TaskPayload = self.put(&path, update).await?;
        Ok(match payload {
            TaskPayload::Envelope { task } | TaskPayload::Bare(task) => task,
        })
    }
}

#[async_trait]
impl WorkspaceGateway for HttpGateway {
    async fn create_board(&self, board: &BoardDraft) -> Result<Board, GatewayError> {
        let payload: BoardPayload = self.post("/board/create", board).await?;
        Ok(match payload {
            BoardPayload::Envelope { board } | BoardPayload::Bare(board) => board,
        })
    }

    async fn my_boards(&self) -> Result<Vec<Board>, GatewayError> {
        let payload: BoardsPayload = self.get("/board/my-boards").await?;
        Ok(match payload {
            BoardsPayload::Envelope { boards } | BoardsPayload::Bare(boards) => boards,
        })
    }

    async fn all_boards(&self) -> Result<Vec<Board>, GatewayError> {
        let payload: BoardsPayload = self.get("/board/all-boards").await?;
        Ok(match payload {
            BoardsPayload::Envelope { boards } | BoardsPayload::Bare(boards) => boards,
        })
    }

    async fn update_board(
        &self,
        board_id: &BoardId,
        board: &BoardDraft,
    ) -> Result<Board, GatewayError> {
        let path = format!("/board/update/{}", board_id);
        let payload: BoardPayload = self.put(&path, board).await?;
        Ok(match payload {
            BoardPayload::Envelope { board } | BoardPayload::Bare(board) => board,
        })
    }

    async fn add_member(&self, board_id: &BoardId, member_id: &UserId) -> Result<(), GatewayError> {
        let path = format!("/board/add-member/{}", board_id);
        self.patch_empty(&path, &MemberRequest { member_id }).await
    }

    async fn board_members(&self, board_id: &BoardId) -> Result<Vec<User>, GatewayError> {
        let path = format!("/board/members/{}", board_id);
        let payload: MembersPayload = self.get(&path).await?;
        Ok(payload.members)
    }

    async fn profile(&self) -> Result<User, GatewayError> {
        let payload: UserPayload = self.get("/user/profile").await?;
        Ok(match payload {
            UserPayload::Envelope { user } | UserPayload::Bare(user) => user,
        })
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>, GatewayError> {
        let path = "/user/search";
        let builder = self.request(Method::GET, path).query(&[("query", query)]);
        let payload: UsersPayload = self.send_json(builder, path).await?;
        Ok(payload.users)
    }
}
