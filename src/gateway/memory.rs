//! In-process stand-in for the persistence API.
//!
//! Behaves like the server as far as the store can observe it: ids are
//! minted here, task moves renumber both affected columns, and every call is
//! recorded so tests can assert on the traffic a store operation produced.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use boardsync_common::{Board, BoardId, Column, ColumnId, Task, TaskId, User, UserId};
use uuid::Uuid;

use super::{
    BoardColumns, BoardDraft, BoardGateway, ColumnMove, NewColumn, NewTask, TaskUpdate,
    WorkspaceGateway,
};
use crate::errors::GatewayError;

/// One recorded request.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    FetchColumns(BoardId),
    CreateColumn(NewColumn),
    RenameColumn { column_id: ColumnId, title: String },
    MoveColumns(ColumnMove),
    CreateTask(NewTask),
    UpdateTask { task_id: TaskId, update: TaskUpdate },
    CreateBoard(BoardDraft),
    MyBoards,
    AllBoards,
    UpdateBoard { board_id: BoardId, draft: BoardDraft },
    AddMember { board_id: BoardId, member_id: UserId },
    BoardMembers(BoardId),
    Profile,
    SearchUsers(String),
}

impl GatewayCall {
    /// Operation name accepted by [`InMemoryGateway::fail_next`].
    pub fn operation(&self) -> &'static str {
        match self {
            Self::FetchColumns(_) => "fetch_columns",
            Self::CreateColumn(_) => "create_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::MoveColumns(_) => "move_columns",
            Self::CreateTask(_) => "create_task",
            Self::UpdateTask { .. } => "update_task",
            Self::CreateBoard(_) => "create_board",
            Self::MyBoards => "my_boards",
            Self::AllBoards => "all_boards",
            Self::UpdateBoard { .. } => "update_board",
            Self::AddMember { .. } => "add_member",
            Self::BoardMembers(_) => "board_members",
            Self::Profile => "profile",
            Self::SearchUsers(_) => "search_users",
        }
    }
}

#[derive(Debug, Default)]
struct ServerState {
    boards: Vec<(Board, bool)>,
    columns: Vec<Column>,
    tasks: Vec<Task>,
    members: Vec<(BoardId, UserId)>,
    users: Vec<User>,
    profile: Option<User>,
    calls: Vec<GatewayCall>,
    failing: HashSet<&'static str>,
}

impl ServerState {
    fn column_tasks(&self, column_id: &ColumnId) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| &t.column_id == column_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.position);
        tasks
    }

    fn renumber_column(&mut self, column_id: &ColumnId, order: &[TaskId]) {
        for (index, id) in order.iter().enumerate() {
            if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
                task.column_id = column_id.clone();
                task.position = index as u32;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<Mutex<ServerState>>,
}

fn not_found(path: String, what: &str) -> GatewayError {
    GatewayError::Status {
        path,
        status: 404,
        message: format!("{what} not found"),
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `call`, then fail it if a failure was armed for its operation.
    fn record(&self, call: GatewayCall) -> Result<MutexGuard<'_, ServerState>, GatewayError> {
        let mut state = self.lock();
        let operation = call.operation();
        state.calls.push(call);
        if state.failing.remove(operation) {
            return Err(GatewayError::Status {
                path: operation.to_string(),
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(state)
    }

    /// Seed a board the current user owns. Columns carry their tasks nested.
    pub fn seed_board(&self, board: Board, columns: Vec<Column>) {
        self.seed(board, columns, true);
    }

    /// Seed a board the current user was added to but does not own.
    pub fn seed_shared_board(&self, board: Board, columns: Vec<Column>) {
        self.seed(board, columns, false);
    }

    fn seed(&self, board: Board, columns: Vec<Column>, owned: bool) {
        let mut state = self.lock();
        for mut column in columns {
            column.board_id = board.id.clone();
            for mut task in std::mem::take(&mut column.tasks) {
                task.column_id = column.id.clone();
                state.tasks.push(task);
            }
            state.columns.push(column);
        }
        state.boards.push((board, owned));
    }

    pub fn seed_user(&self, user: User) {
        self.lock().users.push(user);
    }

    pub fn set_profile(&self, user: User) {
        self.lock().profile = Some(user);
    }

    /// Make the next call of `operation` (see [`GatewayCall::operation`]) fail
    /// with HTTP 500.
    pub fn fail_next(&self, operation: &'static str) {
        self.lock().failing.insert(operation);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Server-side view of a board, columns sorted with their tasks nested.
    pub fn columns_of(&self, board_id: &BoardId) -> Vec<Column> {
        let state = self.lock();
        let mut columns: Vec<Column> = state
            .columns
            .iter()
            .filter(|c| &c.board_id == board_id)
            .map(|c| Column {
                tasks: state.column_tasks(&c.id),
                ..c.clone()
            })
            .collect();
        columns.sort_by_key(|c| c.position);
        columns
    }
}

#[async_trait]
impl BoardGateway for InMemoryGateway {
    async fn fetch_columns(&self, board_id: &BoardId) -> Result<BoardColumns, GatewayError> {
        let state = self.record(GatewayCall::FetchColumns(board_id.clone()))?;
        let board = state
            .boards
            .iter()
            .find(|(b, _)| &b.id == board_id)
            .map(|(b, _)| b.clone())
            .ok_or_else(|| not_found(format!("/column/get-all/{board_id}"), "board"))?;

        // Insertion order, like the real listing; callers sort.
        let columns = state
            .columns
            .iter()
            .filter(|c| &c.board_id == board_id)
            .map(|c| Column {
                tasks: state.column_tasks(&c.id),
                ..c.clone()
            })
            .collect();
        Ok(BoardColumns {
            board_title: Some(board.title),
            columns,
        })
    }

    async fn create_column(&self, column: &NewColumn) -> Result<Column, GatewayError> {
        let mut state = self.record(GatewayCall::CreateColumn(column.clone()))?;
        if !state.boards.iter().any(|(b, _)| b.id == column.board_id) {
            return Err(not_found("/column".to_string(), "board"));
        }
        let created = Column {
            id: ColumnId::new(Uuid::new_v4().to_string()),
            board_id: column.board_id.clone(),
            title: column.title.clone(),
            position: column.position,
            tasks: Vec::new(),
        };
        state.columns.push(created.clone());
        Ok(created)
    }

    async fn rename_column(&self, column_id: &ColumnId, title: &str) -> Result<(), GatewayError> {
        let mut state = self.record(GatewayCall::RenameColumn {
            column_id: column_id.clone(),
            title: title.to_string(),
        })?;
        let column = state
            .columns
            .iter_mut()
            .find(|c| &c.id == column_id)
            .ok_or_else(|| not_found(format!("/column/{column_id}"), "column"))?;
        column.title = title.to_string();
        Ok(())
    }

    async fn move_columns(&self, request: &ColumnMove) -> Result<(), GatewayError> {
        let mut state = self.record(GatewayCall::MoveColumns(request.clone()))?;
        if !state.columns.iter().any(|c| c.id == request.column_id) {
            return Err(not_found("/column/columns/move".to_string(), "column"));
        }
        for entry in &request.all_columns {
            if let Some(column) = state
                .columns
                .iter_mut()
                .find(|c| c.id == entry.id && c.board_id == request.board_id)
            {
                column.position = entry.position;
            }
        }
        Ok(())
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, GatewayError> {
        let mut state = self.record(GatewayCall::CreateTask(task.clone()))?;
        if !state.columns.iter().any(|c| c.id == task.column_id) {
            return Err(not_found("/task".to_string(), "column"));
        }
        let created = Task::new(
            TaskId::new(Uuid::new_v4().to_string()),
            task.column_id.clone(),
            task.title.clone(),
            task.position,
        );
        state.tasks.push(created.clone());
        Ok(created)
    }

    async fn update_task(
        &self,
        task_id: &TaskId,
        update: &TaskUpdate,
    ) -> Result<Task, GatewayError> {
        let mut state = self.record(GatewayCall::UpdateTask {
            task_id: task_id.clone(),
            update: update.clone(),
        })?;
        let path = format!("/task/{task_id}");
        if !state.columns.iter().any(|c| c.id == update.column_id) {
            return Err(not_found(path, "column"));
        }
        let current = state
            .tasks
            .iter()
            .find(|t| &t.id == task_id)
            .cloned()
            .ok_or_else(|| not_found(path, "task"))?;

        if let Some(task) = state.tasks.iter_mut().find(|t| &t.id == task_id) {
            task.title = update.title.clone();
            task.description = update.description.clone();
            task.tags = update.tags.clone();
            task.due_date = update.due_date;
            task.attachments = update.attachments.clone();
        }

        // Keep both affected columns dense.
        let mut source: Vec<TaskId> = state
            .column_tasks(&current.column_id)
            .into_iter()
            .map(|t| t.id)
            .filter(|id| id != task_id)
            .collect();
        if current.column_id == update.column_id {
            let index = (update.position as usize).min(source.len());
            source.insert(index, task_id.clone());
            state.renumber_column(&current.column_id, &source);
        } else {
            let mut destination: Vec<TaskId> = state
                .column_tasks(&update.column_id)
                .into_iter()
                .map(|t| t.id)
                .collect();
            let index = (update.position as usize).min(destination.len());
            destination.insert(index, task_id.clone());
            state.renumber_column(&current.column_id, &source);
            state.renumber_column(&update.column_id, &destination);
        }

        state
            .tasks
            .iter()
            .find(|t| &t.id == task_id)
            .cloned()
            .ok_or_else(|| not_found(format!("/task/{task_id}"), "task"))
    }
}

#[async_trait]
impl WorkspaceGateway for InMemoryGateway {
    async fn create_board(&self, draft: &BoardDraft) -> Result<Board, GatewayError> {
        let mut state = self.record(GatewayCall::CreateBoard(draft.clone()))?;
        let board = Board {
            id: BoardId::new(Uuid::new_v4().to_string()),
            title: draft.title.clone(),
            description: draft.description.clone(),
            visibility: draft.visibility,
        };
        state.boards.push((board.clone(), true));
        Ok(board)
    }

    async fn my_boards(&self) -> Result<Vec<Board>, GatewayError> {
        let state = self.record(GatewayCall::MyBoards)?;
        Ok(state
            .boards
            .iter()
            .filter(|(_, owned)| *owned)
            .map(|(b, _)| b.clone())
            .collect())
    }

    async fn all_boards(&self) -> Result<Vec<Board>, GatewayError> {
        let state = self.record(GatewayCall::AllBoards)?;
        Ok(state.boards.iter().map(|(b, _)| b.clone()).collect())
    }

    async fn update_board(
        &self,
        board_id: &BoardId,
        draft: &BoardDraft,
    ) -> Result<Board, GatewayError> {
        let mut state = self.record(GatewayCall::UpdateBoard {
            board_id: board_id.clone(),
            draft: draft.clone(),
        })?;
        let (board, _) = state
            .boards
            .iter_mut()
            .find(|(b, _)| &b.id == board_id)
            .ok_or_else(|| not_found(format!("/board/update/{board_id}"), "board"))?;
        board.title = draft.title.clone();
        board.description = draft.description.clone();
        board.visibility = draft.visibility;
        Ok(board.clone())
    }

    async fn add_member(&self, board_id: &BoardId, member_id: &UserId) -> Result<(), GatewayError> {
        let mut state = self.record(GatewayCall::AddMember {
            board_id: board_id.clone(),
            member_id: member_id.clone(),
        })?;
        let path = format!("/board/add-member/{board_id}");
        if !state.boards.iter().any(|(b, _)| &b.id == board_id) {
            return Err(not_found(path, "board"));
        }
        if !state.users.iter().any(|u| &u.id == member_id) {
            return Err(not_found(path, "user"));
        }
        let entry = (board_id.clone(), member_id.clone());
        if !state.members.contains(&entry) {
            state.members.push(entry);
        }
        Ok(())
    }

    async fn board_members(&self, board_id: &BoardId) -> Result<Vec<User>, GatewayError> {
        let state = self.record(GatewayCall::BoardMembers(board_id.clone()))?;
        Ok(state
            .members
            .iter()
            .filter(|(b, _)| b == board_id)
            .filter_map(|(_, user_id)| state.users.iter().find(|u| &u.id == user_id).cloned())
            .collect())
    }

    async fn profile(&self) -> Result<User, GatewayError> {
        let state = self.record(GatewayCall::Profile)?;
        state.profile.clone().ok_or(GatewayError::Status {
            path: "/user/profile".to_string(),
            status: 401,
            message: "Not authorized".to_string(),
        })
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>, GatewayError> {
        let state = self.record(GatewayCall::SearchUsers(query.to_string()))?;
        let needle = query.to_lowercase();
        Ok(state
            .users
            .iter()
            .filter(|u| {
                u.user_name.to_lowercase().contains(&needle)
                    || u.email.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardsync_common::{ColumnPosition, Visibility};

    fn board(id: &str) -> Board {
        Board {
            id: BoardId::from(id),
            title: "Roadmap".to_string(),
            description: None,
            visibility: Visibility::Workspace,
        }
    }

    fn column(id: &str, position: u32, tasks: Vec<Task>) -> Column {
        Column {
            id: ColumnId::from(id),
            board_id: BoardId::default(),
            title: id.to_uppercase(),
            position,
            tasks,
        }
    }

    fn task(id: &str, position: u32) -> Task {
        Task::new(TaskId::from(id), ColumnId::default(), id, position)
    }

    fn seeded() -> InMemoryGateway {
        let gateway = InMemoryGateway::new();
        gateway.seed_board(
            board("b1"),
            vec![
                column("c1", 0, vec![task("t1", 0), task("t2", 1)]),
                column("c2", 1, vec![task("t3", 0)]),
            ],
        );
        gateway
    }

    #[tokio::test]
    async fn fetch_nests_tasks_and_records_call() {
        let gateway = seeded();
        let listing = gateway.fetch_columns(&BoardId::from("b1")).await.unwrap();
        assert_eq!(listing.board_title.as_deref(), Some("Roadmap"));
        assert_eq!(listing.columns[0].tasks.len(), 2);
        assert_eq!(listing.columns[0].tasks[0].column_id, ColumnId::from("c1"));
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::FetchColumns(BoardId::from("b1"))]
        );
    }

    #[tokio::test]
    async fn fail_next_fails_exactly_once() {
        let gateway = seeded();
        gateway.fail_next("fetch_columns");
        let err = gateway
            .fetch_columns(&BoardId::from("b1"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(gateway.fetch_columns(&BoardId::from("b1")).await.is_ok());
        assert_eq!(gateway.count("fetch_columns"), 2);
    }

    #[tokio::test]
    async fn task_move_renumbers_both_columns() {
        let gateway = seeded();
        let mut moved = task("t1", 0);
        moved.column_id = ColumnId::from("c2");
        let update = TaskUpdate::from_task(&moved);
        gateway.update_task(&TaskId::from("t1"), &update).await.unwrap();

        let columns = gateway.columns_of(&BoardId::from("b1"));
        let c1: Vec<_> = columns[0].tasks.iter().map(|t| (t.id.as_str(), t.position)).collect();
        let c2: Vec<_> = columns[1].tasks.iter().map(|t| (t.id.as_str(), t.position)).collect();
        assert_eq!(c1, vec![("t2", 0)]);
        assert_eq!(c2, vec![("t1", 0), ("t3", 1)]);
    }

    #[tokio::test]
    async fn move_columns_applies_declared_order() {
        let gateway = seeded();
        gateway
            .move_columns(&ColumnMove {
                board_id: BoardId::from("b1"),
                column_id: ColumnId::from("c2"),
                new_position: 0,
                all_columns: vec![
                    ColumnPosition { id: ColumnId::from("c2"), position: 0 },
                    ColumnPosition { id: ColumnId::from("c1"), position: 1 },
                ],
            })
            .await
            .unwrap();
        let ids: Vec<_> = gateway
            .columns_of(&BoardId::from("b1"))
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![ColumnId::from("c2"), ColumnId::from("c1")]);
    }

    #[tokio::test]
    async fn unknown_column_is_not_found() {
        let gateway = seeded();
        let err = gateway
            .rename_column(&ColumnId::from("nope"), "x")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn owned_and_shared_boards_are_listed_separately() {
        let gateway = seeded();
        gateway.seed_shared_board(board("b2"), vec![]);
        assert_eq!(gateway.my_boards().await.unwrap().len(), 1);
        assert_eq!(gateway.all_boards().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn members_and_search() {
        let gateway = seeded();
        gateway.seed_user(User {
            id: UserId::from("u1"),
            user_name: "Ada".into(),
            email: "ada@example.com".into(),
        });
        assert_eq!(gateway.search_users("ADA").await.unwrap().len(), 1);
        assert!(gateway.search_users("bob").await.unwrap().is_empty());

        let b1 = BoardId::from("b1");
        gateway.add_member(&b1, &UserId::from("u1")).await.unwrap();
        gateway.add_member(&b1, &UserId::from("u1")).await.unwrap();
        assert_eq!(gateway.board_members(&b1).await.unwrap().len(), 1);
        assert!(gateway.add_member(&b1, &UserId::from("ghost")).await.is_err());
    }
}
