//! One-shot board commands: each loads the board, applies one change through
//! the store and prints the result once the server has settled.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;
use tokio::sync::broadcast::{self, error::TryRecvError};

use boardsync::config::SyncConfig;
use boardsync::gateway::{AuthClient, HttpGateway, WorkspaceGateway};
use boardsync::gateway::auth::Credentials;
use boardsync::model::{BoardId, ColumnId, TaskId};
use boardsync::store::{BoardGraph, BoardStore, StoreNotice};

pub(crate) fn build_gateway(config: &SyncConfig) -> Result<HttpGateway> {
    HttpGateway::new(&config.api)
}

pub(crate) async fn open_store(config: &SyncConfig, board: &str) -> Result<BoardStore> {
    let gateway = build_gateway(config)?;
    let store = BoardStore::new(Arc::new(gateway));
    store.load_board(&BoardId::from(board)).await?;
    Ok(store)
}

/// Fail if any background persist reported an error since `notices` was
/// subscribed.
fn check_failures(notices: &mut broadcast::Receiver<StoreNotice>) -> Result<()> {
    loop {
        match notices.try_recv() {
            Ok(StoreNotice::MutationFailed { operation, message }) => {
                bail!("{operation} failed: {message}")
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}

pub(crate) fn print_board(graph: &BoardGraph) {
    println!();
    println!(
        "{} {}",
        style(graph.title.as_deref().unwrap_or("Untitled board")).bold().cyan(),
        style(format!("({})", graph.board_id)).dim()
    );
    if graph.columns.is_empty() {
        println!("  {}", style("No columns yet.").dim());
    }
    for (index, column) in graph.columns.iter().enumerate() {
        println!();
        println!(
            "[{}] {} {}",
            index,
            style(&column.title).bold(),
            style(format!("({}, {} tasks)", column.id, column.tasks.len())).dim()
        );
        for task in &column.tasks {
            let mut line = format!("    {}. {}", task.position, task.title);
            if !task.tags.is_empty() {
                line.push_str(&format!(" #{}", task.tags.join(" #")));
            }
            if let Some(due) = task.due_date {
                line.push_str(&format!(" (due {})", due.format("%Y-%m-%d")));
            }
            println!("{} {}", line, style(format!("[{}]", task.id)).dim());
        }
    }
    println!();
}

fn print_current(store: &BoardStore) -> Result<()> {
    let graph = store.snapshot().context("Board is no longer loaded")?;
    print_board(&graph);
    Ok(())
}

pub async fn cmd_login(config: &SyncConfig, email: &str, password: &str) -> Result<()> {
    let auth = AuthClient::new(build_gateway(config)?);
    let response = auth
        .login(&Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .context("Login failed")?;

    let Some(token) = response.token else {
        bail!(
            "Server did not return a token{}",
            response
                .message
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        );
    };

    if let Some(user) = &response.user {
        println!("Logged in as {}", style(&user.user_name).bold());
    }
    println!();
    println!("export BOARDSYNC_TOKEN={token}");
    Ok(())
}

pub async fn cmd_boards(config: &SyncConfig, all: bool) -> Result<()> {
    let gateway = build_gateway(config)?;
    let boards = if all {
        gateway.all_boards().await?
    } else {
        gateway.my_boards().await?
    };

    if boards.is_empty() {
        println!("No boards found.");
        return Ok(());
    }
    for board in boards {
        println!(
            "{}  {}  {}",
            style(&board.id).dim(),
            style(&board.title).bold(),
            board.visibility.as_str()
        );
    }
    Ok(())
}

pub async fn cmd_show(config: &SyncConfig, board: &str) -> Result<()> {
    let store = open_store(config, board).await?;
    print_current(&store)
}

pub async fn cmd_add_column(config: &SyncConfig, board: &str, title: &str) -> Result<()> {
    let store = open_store(config, board).await?;
    let column = store.add_column(title).await?;
    store.settle().await;
    println!("Created column {}", style(&column.id).green());
    print_current(&store)
}

pub async fn cmd_add_task(
    config: &SyncConfig,
    board: &str,
    column: &str,
    title: &str,
) -> Result<()> {
    let store = open_store(config, board).await?;
    let task = store.add_task(&ColumnId::from(column), title).await?;
    store.settle().await;
    println!("Created task {}", style(&task.id).green());
    print_current(&store)
}

pub async fn cmd_rename_column(
    config: &SyncConfig,
    board: &str,
    column: &str,
    title: &str,
) -> Result<()> {
    let store = open_store(config, board).await?;
    let mut notices = store.subscribe();
    store.rename_column(&ColumnId::from(column), title)?.await?;
    store.settle().await;
    check_failures(&mut notices)?;
    print_current(&store)
}

pub async fn cmd_move_column(
    config: &SyncConfig,
    board: &str,
    column: &str,
    index: usize,
) -> Result<()> {
    let store = open_store(config, board).await?;
    let mut notices = store.subscribe();
    store.move_column(&ColumnId::from(column), index)?.await?;
    store.settle().await;
    check_failures(&mut notices)?;
    print_current(&store)
}

pub async fn cmd_move_task(
    config: &SyncConfig,
    board: &str,
    task: &str,
    to: Option<&str>,
    index: usize,
) -> Result<()> {
    let store = open_store(config, board).await?;
    let task_id = TaskId::from(task);
    let source = store
        .task(&task_id)
        .map(|t| t.column_id)
        .with_context(|| format!("Task {task} is not on board {board}"))?;
    let destination = to.map(ColumnId::from).unwrap_or_else(|| source.clone());

    let mut notices = store.subscribe();
    store
        .move_task(&task_id, &source, &destination, index)?
        .await?;
    store.settle().await;
    check_failures(&mut notices)?;
    print_current(&store)
}
