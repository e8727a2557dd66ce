//! Task Detail Editor: a local draft of one task's fields, written back only
//! on save.

use boardsync_common::{ColumnId, Task, TaskId};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::SyncError;
use crate::gateway::TaskUpdate;
use crate::store::BoardStore;

/// Editable copy of a task. Nothing here touches the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub attachments: Vec<String>,
    /// Target column; `None` keeps the task where it is.
    pub column_id: Option<ColumnId>,
}

impl TaskDraft {
    fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            tags: task.tags.clone(),
            due_date: task.due_date,
            attachments: task.attachments.clone(),
            column_id: None,
        }
    }

    /// Tags behave as a set; blank and duplicate tags are ignored.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Append a trimmed reference. Blank input is ignored; duplicates are
    /// kept since attachments are an ordered list.
    pub fn add_attachment(&mut self, reference: &str) -> bool {
        let reference = reference.trim();
        if reference.is_empty() {
            return false;
        }
        self.attachments.push(reference.to_string());
        true
    }

    /// Remove the attachment at `index`, leaving equal entries elsewhere.
    pub fn remove_attachment(&mut self, index: usize) -> Option<String> {
        (index < self.attachments.len()).then(|| self.attachments.remove(index))
    }

    pub fn clear_due_date(&mut self) {
        self.due_date = None;
    }
}

pub struct TaskEditor {
    store: BoardStore,
    task: Task,
    draft: Option<TaskDraft>,
}

impl TaskEditor {
    /// Open the editor on a task of the loaded board, in read mode.
    pub fn open(store: BoardStore, task_id: &TaskId) -> Result<Self, SyncError> {
        let task = store
            .task(task_id)
            .ok_or_else(|| SyncError::UnknownTask(task_id.clone()))?;
        Ok(Self {
            store,
            task,
            draft: None,
        })
    }

    /// The task as last seen (before any unsaved edits).
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn draft(&self) -> Option<&TaskDraft> {
        self.draft.as_ref()
    }

    /// Enter edit mode (snapshotting the task on first call) and return the
    /// draft.
    pub fn edit(&mut self) -> &mut TaskDraft {
        let task = &self.task;
        self.draft.get_or_insert_with(|| TaskDraft::from_task(task))
    }

    /// Throw the draft away. No request is made.
    pub fn cancel(&mut self) {
        if self.draft.take().is_some() {
            debug!(task_id = %self.task.id, "edit cancelled");
        }
    }

    /// Submit the whole draft as a full overwrite. On success the editor goes
    /// back to read mode showing the server's copy; on failure the draft is
    /// kept so the user can retry.
    pub async fn save(&mut self) -> Result<Task, SyncError> {
        let draft = self
            .draft
            .as_ref()
            .ok_or_else(|| SyncError::Validation("no edit in progress".to_string()))?;
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(SyncError::Validation(
                "Task title must not be empty".to_string(),
            ));
        }

        let update = TaskUpdate {
            title: title.to_string(),
            description: draft.description.clone(),
            tags: draft.tags.clone(),
            due_date: draft.due_date,
            attachments: draft.attachments.clone(),
            column_id: draft
                .column_id
                .clone()
                .unwrap_or_else(|| self.task.column_id.clone()),
            position: self.task.position,
        };
        let saved = self.store.save_task(&self.task.id, &update).await?;
        self.task = saved.clone();
        self.draft = None;
        Ok(saved)
    }
}
