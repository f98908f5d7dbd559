#![forbid(unsafe_code)]

use crate::notice::Operation;
use kb_core::ids::ColumnKeyError;
use kb_core::model::TaskInputError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardError {
    Unauthenticated,
    Validation(String),
    PersistenceFailed {
        operation: Operation,
        message: String,
    },
}

impl BoardError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::PersistenceFailed { .. })
    }
}

impl std::fmt::Display for BoardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated: no current principal"),
            Self::Validation(message) => write!(f, "validation error: {message}"),
            Self::PersistenceFailed { operation, message } => {
                write!(f, "persistence failed ({operation}): {message}")
            }
        }
    }
}

impl std::error::Error for BoardError {}

impl From<TaskInputError> for BoardError {
    fn from(value: TaskInputError) -> Self {
        Self::Validation(value.message().to_string())
    }
}

impl From<ColumnKeyError> for BoardError {
    fn from(value: ColumnKeyError) -> Self {
        Self::Validation(value.message().to_string())
    }
}
