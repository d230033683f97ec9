//! Builds a crew from mission records and runs it.

pub mod delegation;
mod executor;
pub mod output;
pub mod strategy;
pub mod task_graph;
pub mod types;

pub use delegation::{CoworkerPool, IMPLICIT_MANAGER_ROLE, implicit_manager};
pub use executor::{ExecutionEngine, manager_for};
pub use output::classify_output;
pub use strategy::{Crew, ManagerBinding, Process, ProcessMode, select_process};
pub use task_graph::build_task_graph;
pub use types::{CrewOutput, RunResult, RunnableTask, TaskGraph, TaskOutput, TaskRawOutput};

#[cfg(test)]
mod tests;
