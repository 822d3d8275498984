//! Bounded background execution.
//!
//! [`TaskExecutor`] is the only path from the request-serving code to
//! background work: handlers submit closures, a fixed set of workers runs
//! them. Nothing else is spawned per request.

mod task_executor;

pub use task_executor::{
    ExecutorError, ExecutorState, ExecutorStats, TaskContext, TaskExecutor, TaskFuture,
};
