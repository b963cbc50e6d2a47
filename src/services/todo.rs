//! The shared to-do board document and its JSON file store.
//!
//! Items form a tree: a flat list is just a board where no item has children. Positions
//! are 1-based and dotted (`2`, `2.1`), ids are stable across edits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum TodoError {
    #[error("`{0}` is not a task position, use something like 2 or 2.1")]
    BadPosition(String),

    #[error("there is no task at position {0}")]
    NoSuchPosition(TaskRef),

    #[error("there is no task with id {0}")]
    NoSuchId(u64),

    #[error("task text cannot be empty")]
    EmptyText,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: u64,
    pub text: String,
    pub owner: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaskItem>,
}

impl TaskItem {
    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }
}

/// A dotted position such as `2.1`, stored 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef(Vec<usize>);

impl TaskRef {
    pub fn top(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn child(&self, index: usize) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl FromStr for TaskRef {
    type Err = TodoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('#');
        let path = trimmed
            .split('.')
            .map(|part| match part.trim().parse::<usize>() {
                Ok(n) if n >= 1 => Ok(n - 1),
                _ => Err(TodoError::BadPosition(s.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(path))
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| (i + 1).to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoDocument {
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default)]
    pub tasks: Vec<TaskItem>,
    #[serde(default)]
    pub dashboard_message_id: Option<u64>,
}

fn first_id() -> u64 {
    1
}

impl Default for TodoDocument {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            tasks: Vec::new(),
            dashboard_message_id: None,
        }
    }
}

impl TodoDocument {
    fn new_item(&mut self, text: &str, owner: &str) -> Result<TaskItem, TodoError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TodoError::EmptyText);
        }
        let item = TaskItem {
            id: self.next_id,
            text: text.to_string(),
            owner: owner.trim().to_string(),
            status: TaskStatus::Todo,
            children: Vec::new(),
        };
        self.next_id += 1;
        Ok(item)
    }

    /// Appends a top-level item.
    pub fn add(&mut self, text: &str, owner: &str) -> Result<TaskItem, TodoError> {
        let item = self.new_item(text, owner)?;
        self.tasks.push(item.clone());
        Ok(item)
    }

    /// Appends a sub-item as the last child of `parent`.
    pub fn add_child(
        &mut self,
        parent: &TaskRef,
        text: &str,
        owner: &str,
    ) -> Result<TaskItem, TodoError> {
        if self.get(parent).is_none() {
            return Err(TodoError::NoSuchPosition(parent.clone()));
        }
        let item = self.new_item(text, owner)?;
        let parent = self
            .get_mut(parent)
            .ok_or_else(|| TodoError::NoSuchPosition(parent.clone()))?;
        parent.children.push(item.clone());
        Ok(item)
    }

    pub fn get(&self, at: &TaskRef) -> Option<&TaskItem> {
        let (first, rest) = at.0.split_first()?;
        let mut item = self.tasks.get(*first)?;
        for index in rest {
            item = item.children.get(*index)?;
        }
        Some(item)
    }

    fn get_mut(&mut self, at: &TaskRef) -> Option<&mut TaskItem> {
        let (first, rest) = at.0.split_first()?;
        let mut item = self.tasks.get_mut(*first)?;
        for index in rest {
            item = item.children.get_mut(*index)?;
        }
        Some(item)
    }

    pub fn complete(&mut self, at: &TaskRef) -> Result<TaskItem, TodoError> {
        let item = self
            .get_mut(at)
            .ok_or_else(|| TodoError::NoSuchPosition(at.clone()))?;
        item.status = TaskStatus::Done;
        Ok(item.clone())
    }

    /// Removes exactly the item at `at` (with its children); siblings keep their order.
    pub fn remove_at(&mut self, at: &TaskRef) -> Result<TaskItem, TodoError> {
        let missing = || TodoError::NoSuchPosition(at.clone());
        let (last, parent_path) = at.0.split_last().ok_or_else(missing)?;

        let siblings = if parent_path.is_empty() {
            &mut self.tasks
        } else {
            &mut self
                .get_mut(&TaskRef(parent_path.to_vec()))
                .ok_or_else(missing)?
                .children
        };
        if *last >= siblings.len() {
            return Err(missing());
        }
        Ok(siblings.remove(*last))
    }

    pub fn find(&self, id: u64) -> Option<(TaskRef, &TaskItem)> {
        self.flatten().into_iter().find(|(_, item)| item.id == id)
    }

    pub fn remove(&mut self, id: u64) -> Result<TaskItem, TodoError> {
        let (at, _) = self.find(id).ok_or(TodoError::NoSuchId(id))?;
        self.remove_at(&at)
    }

    /// Every item in display order, parents before their children.
    pub fn flatten(&self) -> Vec<(TaskRef, &TaskItem)> {
        fn walk<'a>(items: &'a [TaskItem], parent: Option<&TaskRef>, out: &mut Vec<(TaskRef, &'a TaskItem)>) {
            for (i, item) in items.iter().enumerate() {
                let at = match parent {
                    Some(p) => p.child(i),
                    None => TaskRef::top(i),
                };
                out.push((at.clone(), item));
                walk(&item.children, Some(&at), out);
            }
        }

        let mut out = Vec::new();
        walk(&self.tasks, None, &mut out);
        out
    }
}

/// JSON file holding one `TodoDocument`, rewritten in full on every change.
pub struct TodoStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TodoStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<TodoDocument, TodoError> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Read-modify-write under the store lock. Nothing is written when `f` fails.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut TodoDocument) -> Result<R, TodoError>,
    ) -> Result<R, TodoError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        let result = f(&mut doc)?;
        self.write(&doc).await?;
        Ok(result)
    }

    async fn read(&self) -> Result<TodoDocument, TodoError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    let corrupt = self.path.with_extension("json.corrupt");
                    warn!(
                        "To-do: {} is unreadable, moved to {} and starting empty: {}",
                        self.path.display(),
                        corrupt.display(),
                        e
                    );
                    tokio::fs::rename(&self.path, &corrupt).await?;
                    Ok(TodoDocument::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TodoDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &TodoDocument) -> Result<(), TodoError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("To-do: saved {} item(s)", doc.flatten().len());
        Ok(())
    }
}
