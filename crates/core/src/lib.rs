#![forbid(unsafe_code)]

mod slug;

pub mod model;

pub use slug::{slugify, unique_column_key};

pub mod ids {
    use std::fmt;

    /// Identity of a task as seen by the client.
    ///
    /// A task starts life with a `Temporary` id allocated locally and is upgraded to a
    /// `Durable` id once the remote store confirms the insert. Lookups branch on the tag;
    /// the two id spaces never share a naming convention.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum TaskId {
        Temporary(String),
        Durable(String),
    }

    impl TaskId {
        pub fn temporary(value: impl Into<String>) -> Result<Self, TaskIdError> {
            let value = value.into();
            validate_task_id(&value)?;
            Ok(Self::Temporary(value))
        }

        pub fn durable(value: impl Into<String>) -> Result<Self, TaskIdError> {
            let value = value.into();
            validate_task_id(&value)?;
            Ok(Self::Durable(value))
        }

        pub fn as_str(&self) -> &str {
            match self {
                Self::Temporary(value) | Self::Durable(value) => value,
            }
        }

        pub fn is_temporary(&self) -> bool {
            matches!(self, Self::Temporary(_))
        }

        pub fn is_durable(&self) -> bool {
            matches!(self, Self::Durable(_))
        }
    }

    impl fmt::Display for TaskId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Temporary(value) => write!(f, "tmp:{value}"),
                Self::Durable(value) => f.write_str(value),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum TaskIdError {
        Empty,
        TooLong,
        ContainsControl,
    }

    impl TaskIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "task id must not be empty",
                Self::TooLong => "task id is too long",
                Self::ContainsControl => "task id contains control characters",
            }
        }
    }

    fn validate_task_id(value: &str) -> Result<(), TaskIdError> {
        if value.trim().is_empty() {
            return Err(TaskIdError::Empty);
        }
        if value.len() > 256 {
            return Err(TaskIdError::TooLong);
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(TaskIdError::ContainsControl);
        }
        Ok(())
    }

    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct PrincipalId(String);

    impl PrincipalId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, PrincipalIdError> {
            let value = value.into();
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(PrincipalIdError::Empty);
            }
            if trimmed.len() > 256 {
                return Err(PrincipalIdError::TooLong);
            }
            if trimmed.chars().any(|c| c.is_control()) {
                return Err(PrincipalIdError::ContainsControl);
            }
            Ok(Self(trimmed.to_string()))
        }
    }

    impl fmt::Display for PrincipalId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum PrincipalIdError {
        Empty,
        TooLong,
        ContainsControl,
    }

    impl PrincipalIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "principal id must not be empty",
                Self::TooLong => "principal id is too long",
                Self::ContainsControl => "principal id contains control characters",
            }
        }
    }

    /// Column key, also used as the task `status` value.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ColumnKey(String);

    pub const MAX_COLUMN_KEY_LEN: usize = 64;

    impl ColumnKey {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn into_string(self) -> String {
            self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, ColumnKeyError> {
            let value = value.into();
            validate_column_key(&value)?;
            Ok(Self(value))
        }
    }

    impl fmt::Display for ColumnKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl PartialEq<str> for ColumnKey {
        fn eq(&self, other: &str) -> bool {
            self.0 == other
        }
    }

    impl PartialEq<&str> for ColumnKey {
        fn eq(&self, other: &&str) -> bool {
            self.0 == *other
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ColumnKeyError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl ColumnKeyError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "column key must not be empty",
                Self::TooLong => "column key is too long",
                Self::InvalidFirstChar => "column key must start with a letter or digit",
                Self::InvalidChar { .. } => {
                    "column key may only contain lowercase letters, digits and '-'"
                }
            }
        }
    }

    fn validate_column_key(value: &str) -> Result<(), ColumnKeyError> {
        if value.is_empty() {
            return Err(ColumnKeyError::Empty);
        }
        if value.len() > MAX_COLUMN_KEY_LEN {
            return Err(ColumnKeyError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(ColumnKeyError::Empty);
        };
        if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
            return Err(ColumnKeyError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
                continue;
            }
            return Err(ColumnKeyError::InvalidChar { ch, index });
        }
        Ok(())
    }
}
