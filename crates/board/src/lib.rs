#![forbid(unsafe_code)]

//! Optimistic board state: tasks and columns mutated locally first, then
//! reconciled against a slower remote record store.

mod board;
mod config;
mod drag;
mod error;
mod notice;
mod principal;
mod remap;
pub mod remote;

pub use board::{Board, BoardSnapshot};
pub use config::{BoardConfig, ConfigError};
pub use drag::{DragController, DragState, DragTarget, DropOutcome};
pub use error::BoardError;
pub use notice::{Notice, Operation};
pub use principal::{PrincipalProvider, SessionPrincipal};
pub use remote::{MemoryRecordStore, RecordStore, RemoteError, RemoteOp};

pub use kb_core::ids::{ColumnKey, PrincipalId, TaskId};
pub use kb_core::model::{Column, Task, TaskInput, TaskPatch};
