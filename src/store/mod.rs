//! Board State Store: the single owner of one open board's columns and tasks.
//!
//! Local edits are applied optimistically and persisted in the background.
//! Recovery is always "reload from the server": there is no fine-grained
//! rollback. Overlapping loads are not sequenced; whichever completes last
//! defines the visible state.
//!
//! The state lock is a plain mutex that is never held across an `.await`.
//! Operations that persist in the background spawn onto the current tokio
//! runtime and hand back the task's `JoinHandle`.

pub mod graph;
pub mod reload;

use std::sync::{Arc, Mutex, MutexGuard};

use boardsync_common::{BoardContent, BoardId, Column, ColumnId, RemoteMutation, Task, TaskId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{GatewayError, SyncError};
use crate::gateway::{BoardGateway, NewColumn, NewTask, TaskUpdate};

pub use graph::{BoardGraph, RemoteOutcome, TaskFields};
pub use reload::ReloadGuard;

const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardPhase {
    Unloaded,
    Loading,
    Ready,
}

/// Events the store publishes for observers (UI toasts, the realtime
/// session).
#[derive(Debug, Clone, PartialEq)]
pub enum StoreNotice {
    Loaded { board_id: BoardId },
    /// The board could not be fetched. A retry is a fresh `load_board`.
    LoadFailed { board_id: BoardId, message: String },
    MutationFailed {
        operation: &'static str,
        message: String,
    },
    /// A local mutation the server accepted; this is what peers should hear.
    Confirmed(BoardContent),
}

#[derive(Debug, Default)]
struct StoreState {
    board_id: Option<BoardId>,
    graph: Option<BoardGraph>,
    loads_in_flight: usize,
}

struct StoreInner {
    gateway: Arc<dyn BoardGateway>,
    state: Mutex<StoreState>,
    reload: ReloadGuard,
    notices: broadcast::Sender<StoreNotice>,
}

/// Cheap to clone; clones share the same board.
#[derive(Clone)]
pub struct BoardStore {
    inner: Arc<StoreInner>,
}

fn validate_title(what: &str, title: &str) -> Result<String, SyncError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(SyncError::Validation(format!("{what} title must not be empty")));
    }
    Ok(title.to_string())
}

impl BoardStore {
    pub fn new(gateway: Arc<dyn BoardGateway>) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                gateway,
                state: Mutex::new(StoreState::default()),
                reload: ReloadGuard::new(),
                notices,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, notice: StoreNotice) {
        // No subscribers is fine.
        let _ = self.inner.notices.send(notice);
    }

    fn mutation_failed(&self, operation: &'static str, source: GatewayError) -> SyncError {
        warn!(operation, error = %source, "mutation failed");
        self.notify(StoreNotice::MutationFailed {
            operation,
            message: source.to_string(),
        });
        SyncError::Mutation { operation, source }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreNotice> {
        self.inner.notices.subscribe()
    }

    pub fn phase(&self) -> BoardPhase {
        let state = self.lock();
        if state.graph.is_some() {
            BoardPhase::Ready
        } else if state.loads_in_flight > 0 {
            BoardPhase::Loading
        } else {
            BoardPhase::Unloaded
        }
    }

    pub fn current_board(&self) -> Option<BoardId> {
        self.lock().board_id.clone()
    }

    /// A copy of the current graph, if one is loaded.
    pub fn snapshot(&self) -> Option<BoardGraph> {
        self.lock().graph.clone()
    }

    pub fn task(&self, task_id: &TaskId) -> Option<Task> {
        self.lock()
            .graph
            .as_ref()
            .and_then(|g| g.task(task_id).cloned())
    }

    /// Fetch the board and replace the whole graph. On failure the previous
    /// graph (if any) is kept untouched.
    ///
    /// Switching to a different board drops the old graph immediately. A
    /// response for a board that is no longer current is discarded.
    pub async fn load_board(&self, board_id: &BoardId) -> Result<(), SyncError> {
        {
            let mut state = self.lock();
            if state.board_id.as_ref() != Some(board_id) {
                state.board_id = Some(board_id.clone());
                state.graph = None;
            }
            state.loads_in_flight += 1;
        }
        debug!(board_id = %board_id, "loading board");

        let result = self.inner.gateway.fetch_columns(board_id).await;

        let mut state = self.lock();
        state.loads_in_flight = state.loads_in_flight.saturating_sub(1);
        if state.board_id.as_ref() != Some(board_id) {
            debug!(board_id = %board_id, "discarding load for a board that is no longer open");
            return Ok(());
        }

        match result {
            Ok(listing) => {
                let graph = BoardGraph::from_listing(board_id.clone(), listing);
                info!(
                    board_id = %board_id,
                    columns = graph.columns.len(),
                    tasks = graph.task_count(),
                    "board loaded"
                );
                state.graph = Some(graph);
                drop(state);
                self.notify(StoreNotice::Loaded {
                    board_id: board_id.clone(),
                });
                Ok(())
            }
            Err(source) => {
                drop(state);
                warn!(board_id = %board_id, error = %source, "board load failed");
                self.notify(StoreNotice::LoadFailed {
                    board_id: board_id.clone(),
                    message: source.to_string(),
                });
                Err(SyncError::Load {
                    board_id: board_id.clone(),
                    source,
                })
            }
        }
    }

    /// Ask for a background reload of the current board. Returns false when
    /// nothing was started: no board is open, or a reload is already running
    /// (it will run one more round to cover this request).
    pub fn request_reload(&self) -> bool {
        if self.current_board().is_none() {
            return false;
        }
        if !self.inner.reload.try_begin() {
            debug!("reload already running; coalesced");
            return false;
        }
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                if let Some(board_id) = store.current_board() {
                    if let Err(e) = store.load_board(&board_id).await {
                        debug!(error = %e, "background reload failed");
                    }
                }
                if !store.inner.reload.finish() {
                    break;
                }
            }
        });
        true
    }

    pub fn is_reloading(&self) -> bool {
        self.inner.reload.is_busy()
    }

    /// Wait until no background reload is running.
    pub async fn settle(&self) {
        self.inner.reload.idle().await;
    }

    fn with_graph<T>(
        &self,
        f: impl FnOnce(&mut BoardGraph) -> Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        let mut state = self.lock();
        let graph = state.graph.as_mut().ok_or(SyncError::NotLoaded)?;
        f(graph)
    }

    /// Reorder a column locally and persist the full order in the background.
    /// A rejected persist triggers a reload.
    pub fn move_column(
        &self,
        column_id: &ColumnId,
        destination: usize,
    ) -> Result<JoinHandle<()>, SyncError> {
        let request = self.with_graph(|g| g.move_column(column_id, destination))?;
        debug!(column_id = %column_id, position = request.new_position, "column moved locally");

        let store = self.clone();
        Ok(tokio::spawn(async move {
            match store.inner.gateway.move_columns(&request).await {
                Ok(()) => store.notify(StoreNotice::Confirmed(BoardContent::ColumnsReordered {
                    column_id: request.column_id,
                    new_position: request.new_position,
                    all_columns: request.all_columns,
                })),
                Err(source) => {
                    store.mutation_failed("move column", source);
                    store.request_reload();
                }
            }
        }))
    }

    /// Splice a task into its new place locally, persist its new column and
    /// position, then reload regardless of the outcome.
    pub fn move_task(
        &self,
        task_id: &TaskId,
        source: &ColumnId,
        destination: &ColumnId,
        index: usize,
    ) -> Result<JoinHandle<()>, SyncError> {
        let moved = self.with_graph(|g| g.move_task(task_id, source, destination, index))?;
        debug!(
            task_id = %task_id,
            from = %source,
            to = %destination,
            position = moved.position,
            "task moved locally"
        );

        let store = self.clone();
        let source = source.clone();
        Ok(tokio::spawn(async move {
            let update = TaskUpdate::from_task(&moved);
            match store.inner.gateway.update_task(&moved.id, &update).await {
                Ok(_) => store.notify(StoreNotice::Confirmed(BoardContent::TaskMoved {
                    task_id: moved.id.clone(),
                    source_column_id: source,
                    destination_column_id: moved.column_id.clone(),
                    position: moved.position,
                })),
                Err(e) => {
                    store.mutation_failed("move task", e);
                }
            }
            store.request_reload();
        }))
    }

    /// Create a column at the end of the board. Nothing changes locally until
    /// the server returns it.
    pub async fn add_column(&self, title: &str) -> Result<Column, SyncError> {
        let title = validate_title("Column", title)?;
        let request = self.with_graph(|g| {
            Ok(NewColumn {
                board_id: g.board_id.clone(),
                title,
                position: g.columns.len() as u32,
            })
        })?;

        let column = match self.inner.gateway.create_column(&request).await {
            Ok(column) => column,
            Err(e) => return Err(self.mutation_failed("add column", e)),
        };
        {
            let mut state = self.lock();
            if let Some(graph) = state
                .graph
                .as_mut()
                .filter(|g| g.board_id == request.board_id)
            {
                graph.push_column(column.clone());
            }
        }
        debug!(column_id = %column.id, "column created");
        self.notify(StoreNotice::Confirmed(BoardContent::ColumnCreated {
            column: column.clone(),
        }));
        Ok(column)
    }

    /// Create a task at the end of `column_id`, append the server's copy, then
    /// reload.
    pub async fn add_task(&self, column_id: &ColumnId, title: &str) -> Result<Task, SyncError> {
        let title = validate_title("Task", title)?;
        let request = self.with_graph(|g| {
            let column = g
                .column(column_id)
                .ok_or_else(|| SyncError::UnknownColumn(column_id.clone()))?;
            Ok(NewTask {
                column_id: column_id.clone(),
                title,
                position: column.tasks.len() as u32,
            })
        })?;

        let mut task = match self.inner.gateway.create_task(&request).await {
            Ok(task) => task,
            Err(e) => return Err(self.mutation_failed("add task", e)),
        };
        if task.column_id.is_empty() {
            task.column_id = column_id.clone();
        }
        {
            let mut state = self.lock();
            if let Some(graph) = state.graph.as_mut() {
                graph.push_task(task.clone());
            }
        }
        debug!(task_id = %task.id, column_id = %column_id, "task created");
        self.notify(StoreNotice::Confirmed(BoardContent::TaskCreated { task: task.clone() }));
        self.request_reload();
        Ok(task)
    }

    /// Retitle a column locally and persist in the background. A rejected
    /// persist triggers a reload.
    pub fn rename_column(
        &self,
        column_id: &ColumnId,
        title: &str,
    ) -> Result<JoinHandle<()>, SyncError> {
        let title = validate_title("Column", title)?;
        self.with_graph(|g| g.rename_column(column_id, &title))?;

        let store = self.clone();
        let column_id = column_id.clone();
        Ok(tokio::spawn(async move {
            match store.inner.gateway.rename_column(&column_id, &title).await {
                Ok(()) => store.notify(StoreNotice::Confirmed(BoardContent::ColumnTitleChanged {
                    column_id,
                    title,
                })),
                Err(e) => {
                    store.mutation_failed("rename column", e);
                    store.request_reload();
                }
            }
        }))
    }

    /// Fold a peer's mutation into the graph without a round trip. Events the
    /// graph cannot apply safely (every task move among them) start a reload.
    pub fn apply_remote_mutation(&self, mutation: &RemoteMutation) -> RemoteOutcome {
        let outcome = {
            let mut state = self.lock();
            match state.graph.as_mut() {
                Some(graph) => graph.apply_remote(mutation),
                None => RemoteOutcome::Ignored,
            }
        };
        debug!(kind = mutation.kind(), ?outcome, "remote mutation");
        if outcome == RemoteOutcome::NeedsReload {
            self.request_reload();
        }
        outcome
    }

    /// Merge fields into a task wherever it is. Returns false (and changes
    /// nothing) when the task is not on the board.
    pub fn update_task_fields(&self, task_id: &TaskId, fields: &TaskFields) -> bool {
        let mut state = self.lock();
        state
            .graph
            .as_mut()
            .is_some_and(|g| g.update_task_fields(task_id, fields))
    }

    /// Persist a full task overwrite, merge the server's copy, then reload.
    pub async fn save_task(&self, task_id: &TaskId, update: &TaskUpdate) -> Result<Task, SyncError> {
        let saved = match self.inner.gateway.update_task(task_id, update).await {
            Ok(task) => task,
            Err(e) => return Err(self.mutation_failed("update task", e)),
        };
        self.update_task_fields(task_id, &TaskFields::from_task(&saved));
        debug!(task_id = %task_id, "task saved");
        self.notify(StoreNotice::Confirmed(BoardContent::TaskUpdated {
            task: saved.clone(),
        }));
        self.request_reload();
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::graph::tests::{column, task};
    use super::*;
    use crate::gateway::{BoardColumns, ColumnMove, GatewayCall, InMemoryGateway};
    use async_trait::async_trait;
    use boardsync_common::{Board, Visibility};
    use std::collections::VecDeque;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn board_b1() -> Board {
        Board {
            id: BoardId::from("b1"),
            title: "Roadmap".into(),
            description: None,
            visibility: Visibility::Workspace,
        }
    }

    async fn loaded(columns: Vec<Column>) -> (BoardStore, InMemoryGateway) {
        let gateway = InMemoryGateway::new();
        gateway.seed_board(board_b1(), columns);
        let store = BoardStore::new(Arc::new(gateway.clone()));
        store.load_board(&BoardId::from("b1")).await.unwrap();
        gateway.clear_calls();
        (store, gateway)
    }

    fn column_ids(store: &BoardStore) -> Vec<String> {
        store
            .snapshot()
            .unwrap()
            .columns
            .iter()
            .map(|c| c.id.to_string())
            .collect()
    }

    fn task_ids(store: &BoardStore, column_id: &str) -> Vec<String> {
        store
            .snapshot()
            .unwrap()
            .column(&ColumnId::from(column_id))
            .unwrap()
            .tasks
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    }

    #[tokio::test]
    async fn load_sorts_columns_and_tasks() {
        let (store, _) = loaded(vec![
            column("c2", 1, vec![task("t2", 1), task("t1", 0)]),
            column("c1", 0, vec![]),
        ])
        .await;
        assert_eq!(store.phase(), BoardPhase::Ready);
        assert_eq!(column_ids(&store), vec!["c1", "c2"]);
        assert_eq!(task_ids(&store, "c2"), vec!["t1", "t2"]);
        let graph = store.snapshot().unwrap();
        assert_eq!(graph.title.as_deref(), Some("Roadmap"));
    }

    #[tokio::test]
    async fn failed_first_load_returns_to_unloaded() {
        let gateway = InMemoryGateway::new();
        gateway.seed_board(board_b1(), vec![column("c1", 0, vec![])]);
        gateway.fail_next("fetch_columns");
        let store = BoardStore::new(Arc::new(gateway));
        let mut notices = store.subscribe();

        let err = store.load_board(&BoardId::from("b1")).await.unwrap_err();
        assert!(matches!(err, SyncError::Load { .. }));
        assert_eq!(store.phase(), BoardPhase::Unloaded);
        assert!(store.snapshot().is_none());
        assert!(matches!(
            notices.recv().await.unwrap(),
            StoreNotice::LoadFailed { .. }
        ));

        // Retry works.
        store.load_board(&BoardId::from("b1")).await.unwrap();
        assert_eq!(store.phase(), BoardPhase::Ready);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_graph() {
        let (store, gateway) = loaded(vec![column("c1", 0, vec![task("t1", 0)])]).await;
        let before = store.snapshot();
        gateway.fail_next("fetch_columns");
        assert!(store.load_board(&BoardId::from("b1")).await.is_err());
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.phase(), BoardPhase::Ready);
    }

    #[tokio::test]
    async fn mutations_before_load_are_refused() {
        let store = BoardStore::new(Arc::new(InMemoryGateway::new()));
        assert!(matches!(
            store.move_column(&ColumnId::from("c1"), 0),
            Err(SyncError::NotLoaded)
        ));
        assert!(matches!(
            store.add_column("Doing").await,
            Err(SyncError::NotLoaded)
        ));
        assert!(!store.request_reload());
    }

    #[tokio::test]
    async fn add_task_appends_then_reloads() {
        let (store, gateway) = loaded(vec![
            column("c1", 0, vec![]),
            column("c2", 1, vec![]),
        ])
        .await;

        let created = store.add_task(&ColumnId::from("c1"), "Buy milk").await.unwrap();
        assert_eq!(created.position, 0);
        store.settle().await;

        let graph = store.snapshot().unwrap();
        let c1 = graph.column(&ColumnId::from("c1")).unwrap();
        assert_eq!(c1.tasks.len(), 1);
        assert_eq!(c1.tasks[0].title, "Buy milk");
        assert_eq!(c1.tasks[0].position, 0);
        assert_eq!(gateway.count("fetch_columns"), 1);
    }

    #[tokio::test]
    async fn empty_titles_never_reach_the_server() {
        let (store, gateway) = loaded(vec![column("c1", 0, vec![])]).await;
        assert!(matches!(
            store.add_task(&ColumnId::from("c1"), "   ").await,
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            store.add_column("").await,
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            store.rename_column(&ColumnId::from("c1"), ""),
            Err(SyncError::Validation(_))
        ));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn move_column_is_visible_before_the_server_answers() {
        let (store, gateway) = loaded(vec![column("c1", 0, vec![]), column("c2", 1, vec![])]).await;

        let handle = store.move_column(&ColumnId::from("c2"), 0).unwrap();
        // The persist task has not run yet on this single-threaded runtime.
        assert!(gateway.calls().is_empty());
        let graph = store.snapshot().unwrap();
        let order: Vec<(&str, u32)> = graph
            .columns
            .iter()
            .map(|c| (c.id.as_str(), c.position))
            .collect();
        assert_eq!(order, vec![("c2", 0), ("c1", 1)]);

        handle.await.unwrap();
        match &gateway.calls()[0] {
            GatewayCall::MoveColumns(ColumnMove {
                column_id,
                new_position,
                all_columns,
                ..
            }) => {
                assert_eq!(column_id, &ColumnId::from("c2"));
                assert_eq!(*new_position, 0);
                assert_eq!(all_columns.len(), 2);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn uncontested_move_survives_reload() {
        let (store, _) = loaded(vec![
            column("c1", 0, vec![]),
            column("c2", 1, vec![]),
            column("c3", 2, vec![]),
        ])
        .await;
        store.move_column(&ColumnId::from("c1"), 2).unwrap().await.unwrap();
        store.load_board(&BoardId::from("b1")).await.unwrap();
        assert_eq!(column_ids(&store), vec!["c2", "c3", "c1"]);
    }

    #[tokio::test]
    async fn rejected_column_move_reloads_server_order() {
        let (store, gateway) = loaded(vec![column("c1", 0, vec![]), column("c2", 1, vec![])]).await;
        let mut notices = store.subscribe();
        gateway.fail_next("move_columns");

        store.move_column(&ColumnId::from("c2"), 0).unwrap().await.unwrap();
        store.settle().await;

        assert_eq!(column_ids(&store), vec!["c1", "c2"]);
        assert_eq!(gateway.count("fetch_columns"), 1);
        assert!(matches!(
            notices.recv().await.unwrap(),
            StoreNotice::MutationFailed {
                operation: "move column",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn move_task_splices_immediately_and_always_reloads() {
        let (store, gateway) = loaded(vec![
            column("c1", 0, vec![task("t1", 0), task("t2", 1)]),
            column("c2", 1, vec![task("t3", 0)]),
        ])
        .await;

        let handle = store
            .move_task(&TaskId::from("t1"), &ColumnId::from("c1"), &ColumnId::from("c2"), 0)
            .unwrap();
        assert_eq!(task_ids(&store, "c1"), vec!["t2"]);
        assert_eq!(task_ids(&store, "c2"), vec!["t1", "t3"]);
        assert_eq!(store.snapshot().unwrap().task_count(), 3);

        handle.await.unwrap();
        store.settle().await;
        assert_eq!(gateway.count("update_task"), 1);
        assert_eq!(gateway.count("fetch_columns"), 1);
        assert_eq!(task_ids(&store, "c2"), vec!["t1", "t3"]);

        // A failed persist still reloads, and the server order wins.
        gateway.clear_calls();
        gateway.fail_next("update_task");
        store
            .move_task(&TaskId::from("t2"), &ColumnId::from("c1"), &ColumnId::from("c2"), 0)
            .unwrap()
            .await
            .unwrap();
        store.settle().await;
        assert_eq!(gateway.count("fetch_columns"), 1);
        assert_eq!(task_ids(&store, "c1"), vec!["t2"]);
    }

    #[tokio::test]
    async fn rename_column_confirms_and_publishes() {
        let (store, gateway) = loaded(vec![column("c1", 0, vec![])]).await;
        let mut notices = store.subscribe();
        store
            .rename_column(&ColumnId::from("c1"), "  Doing ")
            .unwrap()
            .await
            .unwrap();
        assert_eq!(store.snapshot().unwrap().columns[0].title, "Doing");
        assert_eq!(
            gateway.columns_of(&BoardId::from("b1"))[0].title,
            "Doing"
        );
        assert_eq!(
            notices.recv().await.unwrap(),
            StoreNotice::Confirmed(BoardContent::ColumnTitleChanged {
                column_id: ColumnId::from("c1"),
                title: "Doing".into(),
            })
        );
    }

    #[tokio::test]
    async fn add_column_appends_at_end() {
        let (store, gateway) = loaded(vec![column("c1", 0, vec![])]).await;
        let created = store.add_column("Done").await.unwrap();
        assert_eq!(created.position, 1);
        assert_eq!(column_ids(&store).len(), 2);
        assert_eq!(gateway.count("fetch_columns"), 0);
    }

    #[tokio::test]
    async fn remote_task_move_triggers_reload() {
        let (store, gateway) = loaded(vec![
            column("c1", 0, vec![task("t1", 0)]),
            column("c2", 1, vec![]),
        ])
        .await;
        let outcome = store.apply_remote_mutation(&RemoteMutation::TaskMoved {
            task_id: TaskId::from("t1"),
            destination_column_id: ColumnId::from("c2"),
            position: 0,
        });
        assert_eq!(outcome, RemoteOutcome::NeedsReload);
        store.settle().await;
        assert_eq!(gateway.count("fetch_columns"), 1);
    }

    #[tokio::test]
    async fn reload_storm_is_coalesced() {
        let (store, gateway) = loaded(vec![column("c1", 0, vec![])]).await;
        assert!(store.request_reload());
        for _ in 0..5 {
            assert!(!store.request_reload());
        }
        store.settle().await;
        assert!(!store.is_reloading());
        assert_eq!(gateway.count("fetch_columns"), 2);
    }

    #[tokio::test]
    async fn update_fields_for_unknown_task_is_noop() {
        let (store, _) = loaded(vec![column("c1", 0, vec![task("t1", 0)])]).await;
        let before = store.snapshot();
        let fields = TaskFields {
            title: Some("ghost".into()),
            ..TaskFields::default()
        };
        assert!(!store.update_task_fields(&TaskId::from("nope"), &fields));
        assert_eq!(store.snapshot(), before);
    }

    /// Answers `fetch_columns` from queued oneshot receivers so a test
    /// controls the order in which overlapping loads complete.
    struct ScriptedGateway {
        responses: Mutex<VecDeque<oneshot::Receiver<BoardColumns>>>,
    }

    #[async_trait]
    impl BoardGateway for ScriptedGateway {
        async fn fetch_columns(&self, _: &BoardId) -> Result<BoardColumns, GatewayError> {
            let rx = self.responses.lock().unwrap().pop_front().unwrap();
            Ok(rx.await.unwrap())
        }
        async fn create_column(&self, _: &NewColumn) -> Result<Column, GatewayError> {
            unimplemented!()
        }
        async fn rename_column(&self, _: &ColumnId, _: &str) -> Result<(), GatewayError> {
            unimplemented!()
        }
        async fn move_columns(&self, _: &ColumnMove) -> Result<(), GatewayError> {
            unimplemented!()
        }
        async fn create_task(&self, _: &NewTask) -> Result<Task, GatewayError> {
            unimplemented!()
        }
        async fn update_task(&self, _: &TaskId, _: &TaskUpdate) -> Result<Task, GatewayError> {
            unimplemented!()
        }
    }

    fn listing(title: &str) -> BoardColumns {
        BoardColumns {
            board_title: Some(title.to_string()),
            columns: vec![column("c1", 0, vec![])],
        }
    }

    #[tokio::test]
    async fn last_completed_load_wins() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let gateway = ScriptedGateway {
            responses: Mutex::new(VecDeque::from([first_rx, second_rx])),
        };
        let store = BoardStore::new(Arc::new(gateway));
        let board = BoardId::from("b1");

        let first = {
            let store = store.clone();
            let board = board.clone();
            tokio::spawn(async move { store.load_board(&board).await })
        };
        tokio::task::yield_now().await;
        let second = {
            let store = store.clone();
            let board = board.clone();
            tokio::spawn(async move { store.load_board(&board).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(store.phase(), BoardPhase::Loading);

        // The later request resolves first; the earlier one lands last.
        second_tx.send(listing("from second")).unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(
            store.snapshot().unwrap().title.as_deref(),
            Some("from second")
        );

        first_tx.send(listing("from first")).unwrap();
        tokio::time::timeout(Duration::from_secs(1), first)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            store.snapshot().unwrap().title.as_deref(),
            Some("from first")
        );
    }

    #[tokio::test]
    async fn load_for_a_closed_board_is_discarded() {
        let (old_tx, old_rx) = oneshot::channel();
        let (new_tx, new_rx) = oneshot::channel();
        let gateway = ScriptedGateway {
            responses: Mutex::new(VecDeque::from([old_rx, new_rx])),
        };
        let store = BoardStore::new(Arc::new(gateway));

        let old = {
            let store = store.clone();
            tokio::spawn(async move { store.load_board(&BoardId::from("old")).await })
        };
        tokio::task::yield_now().await;
        let new = {
            let store = store.clone();
            tokio::spawn(async move { store.load_board(&BoardId::from("new")).await })
        };
        tokio::task::yield_now().await;

        new_tx.send(listing("new board")).unwrap();
        new.await.unwrap().unwrap();
        old_tx.send(listing("old board")).unwrap();
        old.await.unwrap().unwrap();

        let graph = store.snapshot().unwrap();
        assert_eq!(graph.board_id, BoardId::from("new"));
        assert_eq!(graph.title.as_deref(), Some("new board"));
    }
}
