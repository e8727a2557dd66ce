//! The in-memory board graph and the pure operations on it.
//!
//! Nothing here talks to the network; [`super::BoardStore`] decides when an
//! operation runs and what gets persisted afterwards.

use boardsync_common::{BoardId, Column, ColumnId, ColumnPosition, RemoteMutation, Task, TaskId};
use chrono::{DateTime, Utc};

use crate::errors::SyncError;
use crate::gateway::{BoardColumns, ColumnMove};

/// Columns of one board, sorted by position, each with its tasks sorted by
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardGraph {
    pub board_id: BoardId,
    pub title: Option<String>,
    pub columns: Vec<Column>,
}

/// What folding a remote mutation into the graph did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Applied,
    /// Already reflected locally, or addressed at something we do not hold.
    Ignored,
    /// The event cannot be applied safely; the board must be re-fetched.
    NeedsReload,
}

/// A partial set of task fields. `None` leaves the field alone;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFields {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<String>>,
}

impl TaskFields {
    /// Every editable field of `task`.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            due_date: Some(task.due_date),
            tags: Some(task.tags.clone()),
            attachments: Some(task.attachments.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(attachments) = &self.attachments {
            task.attachments = attachments.clone();
        }
    }
}

fn renumber_columns(columns: &mut [Column]) {
    for (index, column) in columns.iter_mut().enumerate() {
        column.position = index as u32;
    }
}

impl BoardGraph {
    /// Build the graph from a column listing. Column positions are made dense
    /// after sorting; task order follows the server's positions as given.
    pub fn from_listing(board_id: BoardId, listing: BoardColumns) -> Self {
        let mut columns = listing.columns;
        columns.sort_by_key(|c| c.position);
        renumber_columns(&mut columns);
        for column in &mut columns {
            column.tasks.sort_by_key(|t| t.position);
            for task in &mut column.tasks {
                task.column_id = column.id.clone();
            }
        }
        Self {
            board_id,
            title: listing.board_title,
            columns,
        }
    }

    pub fn column(&self, column_id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == column_id)
    }

    fn column_mut(&mut self, column_id: &ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| &c.id == column_id)
    }

    fn column_index(&self, column_id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| &c.id == column_id)
    }

    /// (column index, task index) of a task, scanning every column.
    fn locate_task(&self, task_id: &TaskId) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, column)| {
            column
                .tasks
                .iter()
                .position(|t| &t.id == task_id)
                .map(|ti| (ci, ti))
        })
    }

    pub fn task(&self, task_id: &TaskId) -> Option<&Task> {
        self.locate_task(task_id)
            .map(|(ci, ti)| &self.columns[ci].tasks[ti])
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn column_order(&self) -> Vec<ColumnPosition> {
        self.columns
            .iter()
            .map(|c| ColumnPosition {
                id: c.id.clone(),
                position: c.position,
            })
            .collect()
    }

    /// Move a column to `destination` (clamped), renumber every column, and
    /// return the persist request describing the new order.
    pub fn move_column(
        &mut self,
        column_id: &ColumnId,
        destination: usize,
    ) -> Result<ColumnMove, SyncError> {
        let from = self
            .column_index(column_id)
            .ok_or_else(|| SyncError::UnknownColumn(column_id.clone()))?;
        let column = self.columns.remove(from);
        let to = destination.min(self.columns.len());
        self.columns.insert(to, column);
        renumber_columns(&mut self.columns);

        Ok(ColumnMove {
            board_id: self.board_id.clone(),
            column_id: column_id.clone(),
            new_position: to as u32,
            all_columns: self.column_order(),
        })
    }

    /// Splice a task out of `source` and into `destination` at `index`
    /// (clamped). Only the moved task's column and position change; sibling
    /// positions are left for the server to settle. Returns the moved task.
    pub fn move_task(
        &mut self,
        task_id: &TaskId,
        source: &ColumnId,
        destination: &ColumnId,
        index: usize,
    ) -> Result<Task, SyncError> {
        let source_index = self
            .column_index(source)
            .ok_or_else(|| SyncError::UnknownColumn(source.clone()))?;
        let destination_index = self
            .column_index(destination)
            .ok_or_else(|| SyncError::UnknownColumn(destination.clone()))?;
        let task_index = self.columns[source_index]
            .tasks
            .iter()
            .position(|t| &t.id == task_id)
            .ok_or_else(|| SyncError::UnknownTask(task_id.clone()))?;

        let mut task = self.columns[source_index].tasks.remove(task_index);
        let target = &mut self.columns[destination_index].tasks;
        let to = index.min(target.len());
        task.column_id = destination.clone();
        task.position = to as u32;
        target.insert(to, task.clone());
        Ok(task)
    }

    /// Append a column, replacing any column with the same id.
    pub fn push_column(&mut self, column: Column) {
        match self.column_index(&column.id) {
            Some(index) => self.columns[index] = column,
            None => self.columns.push(column),
        }
    }

    /// Append a task to its column, replacing any task with the same id.
    /// Returns false when the column is unknown.
    pub fn push_task(&mut self, task: Task) -> bool {
        if let Some((ci, ti)) = self.locate_task(&task.id) {
            if self.columns[ci].id == task.column_id {
                self.columns[ci].tasks[ti] = task;
                return true;
            }
            self.columns[ci].tasks.remove(ti);
        }
        match self.column_mut(&task.column_id) {
            Some(column) => {
                column.tasks.push(task);
                true
            }
            None => false,
        }
    }

    pub fn rename_column(&mut self, column_id: &ColumnId, title: &str) -> Result<(), SyncError> {
        let column = self
            .column_mut(column_id)
            .ok_or_else(|| SyncError::UnknownColumn(column_id.clone()))?;
        column.title = title.to_string();
        Ok(())
    }

    /// Merge `fields` into the task wherever it lives. False when not found.
    pub fn update_task_fields(&mut self, task_id: &TaskId, fields: &TaskFields) -> bool {
        match self.locate_task(task_id) {
            Some((ci, ti)) => {
                fields.apply(&mut self.columns[ci].tasks[ti]);
                true
            }
            None => false,
        }
    }

    pub fn apply_remote(&mut self, mutation: &RemoteMutation) -> RemoteOutcome {
        match mutation {
            RemoteMutation::ColumnCreated(column) => {
                if !column.board_id.is_empty() && column.board_id != self.board_id {
                    return RemoteOutcome::Ignored;
                }
                if self.column_index(&column.id).is_some() {
                    return RemoteOutcome::Ignored;
                }
                let mut column = column.clone();
                column.board_id = self.board_id.clone();
                column.tasks.sort_by_key(|t| t.position);
                let at = (column.position as usize).min(self.columns.len());
                self.columns.insert(at, column);
                renumber_columns(&mut self.columns);
                RemoteOutcome::Applied
            }
            RemoteMutation::ColumnUpdated { column_id, title } => {
                match (self.column_mut(column_id), title) {
                    (Some(column), Some(title)) if &column.title != title => {
                        column.title = title.clone();
                        RemoteOutcome::Applied
                    }
                    _ => RemoteOutcome::Ignored,
                }
            }
            RemoteMutation::ColumnDeleted { column_id } => match self.column_index(column_id) {
                Some(index) => {
                    self.columns.remove(index);
                    renumber_columns(&mut self.columns);
                    RemoteOutcome::Applied
                }
                None => RemoteOutcome::Ignored,
            },
            RemoteMutation::ColumnsReordered { order } => {
                let known = self
                    .columns
                    .iter()
                    .all(|c| order.iter().any(|entry| entry.id == c.id));
                if !known || order.len() != self.columns.len() {
                    return RemoteOutcome::NeedsReload;
                }
                if order == &self.column_order() {
                    return RemoteOutcome::Ignored;
                }
                for entry in order {
                    if let Some(column) = self.column_mut(&entry.id) {
                        column.position = entry.position;
                    }
                }
                self.columns.sort_by_key(|c| c.position);
                renumber_columns(&mut self.columns);
                RemoteOutcome::Applied
            }
            RemoteMutation::TaskCreated(task) => {
                if self.task(&task.id).is_some() {
                    return RemoteOutcome::Ignored;
                }
                match self.column_mut(&task.column_id) {
                    Some(column) => {
                        let at = (task.position as usize).min(column.tasks.len());
                        column.tasks.insert(at, task.clone());
                        RemoteOutcome::Applied
                    }
                    None => RemoteOutcome::NeedsReload,
                }
            }
            RemoteMutation::TaskUpdated(task) => match self.locate_task(&task.id) {
                Some((ci, ti)) if self.columns[ci].id == task.column_id => {
                    let local = &mut self.columns[ci].tasks[ti];
                    if local == task {
                        return RemoteOutcome::Ignored;
                    }
                    TaskFields::from_task(task).apply(local);
                    RemoteOutcome::Applied
                }
                _ => RemoteOutcome::NeedsReload,
            },
            // Ordering in the event is not enough to rebuild dense positions.
            RemoteMutation::TaskMoved { .. } => RemoteOutcome::NeedsReload,
            RemoteMutation::TaskDeleted { task_id } => match self.locate_task(task_id) {
                Some((ci, ti)) => {
                    self.columns[ci].tasks.remove(ti);
                    RemoteOutcome::Applied
                }
                None => RemoteOutcome::Ignored,
            },
        }
    }
}
