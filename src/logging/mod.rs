//! Durable hierarchical execution logging

mod execution_logger;

pub use execution_logger::{
    ExecutionLogDoc, ExecutionLogger, LogMetadata, ManagerLog, ReactEntryKind,
    ToolInvocationRecord,
};
