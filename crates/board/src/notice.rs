#![forbid(unsafe_code)]

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListTasks,
    ListColumns,
    CreateTask,
    UpdateTask,
    DeleteTask,
    MoveTask,
    AddColumn,
    DeleteColumn,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListTasks => "list_tasks",
            Self::ListColumns => "list_columns",
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
            Self::MoveTask => "move_task",
            Self::AddColumn => "add_column",
            Self::DeleteColumn => "delete_column",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-visible outcome of a remote write, delivered out of band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Saved {
        operation: Operation,
    },
    /// `degraded` is set when the optimistic local result was kept anyway.
    PersistenceFailed {
        operation: Operation,
        degraded: bool,
        message: String,
    },
}

impl Notice {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Saved { operation } | Self::PersistenceFailed { operation, .. } => *operation,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PersistenceFailed { .. })
    }
}
