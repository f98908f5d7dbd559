#![forbid(unsafe_code)]

use crate::ids::{ColumnKey, PrincipalId, TaskId};

/// Default columns seeded for every principal. They cannot be deleted.
pub const PROTECTED_COLUMNS: [(&str, &str); 3] = [
    ("todo", "To Do"),
    ("inprogress", "In Progress"),
    ("done", "Done"),
];

pub const MAX_TITLE_LEN: usize = 512;

pub fn is_protected_column(key: &ColumnKey) -> bool {
    PROTECTED_COLUMNS
        .iter()
        .any(|(candidate, _)| *candidate == key.as_str())
}

pub fn default_columns(owner: &PrincipalId) -> Vec<Column> {
    PROTECTED_COLUMNS
        .iter()
        .enumerate()
        .filter_map(|(position, (key, label))| {
            let key = ColumnKey::try_new(*key).ok()?;
            Some(Column {
                key,
                label: (*label).to_string(),
                position: position as i64,
                owner_id: owner.clone(),
            })
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: ColumnKey,
    pub created_at_ms: i64,
    pub owner_id: PrincipalId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub key: ColumnKey,
    pub label: String,
    pub position: i64,
    pub owner_id: PrincipalId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskInputError {
    EmptyTitle,
    TitleTooLong,
}

impl TaskInputError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptyTitle => "title must not be empty",
            Self::TitleTooLong => "title is too long",
        }
    }
}

fn normalize_title(raw: &str) -> Result<String, TaskInputError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(TaskInputError::EmptyTitle);
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(TaskInputError::TitleTooLong);
    }
    Ok(title.to_string())
}

/// User input for a new task. `status` falls back to the first column when absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskInput {
    pub title: String,
    pub description: String,
    pub status: Option<ColumnKey>,
}

impl TaskInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: ColumnKey) -> Self {
        self.status = Some(status);
        self
    }

    pub fn normalized(&self) -> Result<Self, TaskInputError> {
        Ok(Self {
            title: normalize_title(&self.title)?,
            description: self.description.trim().to_string(),
            status: self.status.clone(),
        })
    }
}

/// Field-level edit of an existing task. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ColumnKey>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }

    pub fn normalized(&self) -> Result<Self, TaskInputError> {
        Ok(Self {
            title: self.title.as_deref().map(normalize_title).transpose()?,
            description: self.description.as_deref().map(|d| d.trim().to_string()),
            status: self.status.clone(),
        })
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(status) = &self.status {
            task.status = status.clone();
        }
    }
}
