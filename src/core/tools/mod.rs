//! Agent tools and the registry that builds them by declared name.

pub mod code_interpreter;
pub mod image_generator;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use code_interpreter::{CodeExecutor, ProcessCodeExecutor, TimeoutCodeInterpreter};
pub use image_generator::{HttpImageBackend, ImageBackend, ImageGenerator};

use crate::core::images::ImageStore;

/// A named capability an agent may invoke while working on a task.
///
/// `run` has no error channel: a failing tool answers with text the agent can
/// read and react to, so a tool can never abort a run.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Argument shape shown to the model, e.g. `{"prompt": "<text>"}`.
    fn usage(&self) -> &str;

    /// When true, the tool's output becomes the task's final answer verbatim.
    fn result_as_answer(&self) -> bool {
        false
    }

    /// Whether this particular output ends the task. Failure text never
    /// does, so the agent can read it and retry.
    fn answers_with(&self, _output: &str) -> bool {
        self.result_as_answer()
    }

    async fn run(&self, input: Value) -> String;
}

/// Read a string argument from a tool input: the named field of an object, or
/// the input itself when the model passed a bare string.
pub(crate) fn string_arg<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    match input {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get(field).and_then(Value::as_str),
        _ => None,
    }
}

pub struct ToolRegistry {
    image_backend: Arc<dyn ImageBackend>,
    image_store: ImageStore,
    image_result_as_answer: bool,
    code_executor: Arc<dyn CodeExecutor>,
    code_timeout: Duration,
}

impl ToolRegistry {
    pub fn new(
        image_backend: Arc<dyn ImageBackend>,
        image_store: ImageStore,
        code_executor: Arc<dyn CodeExecutor>,
        code_timeout: Duration,
    ) -> Self {
        Self {
            image_backend,
            image_store,
            image_result_as_answer: true,
            code_executor,
            code_timeout,
        }
    }

    pub fn with_image_result_as_answer(mut self, enabled: bool) -> Self {
        self.image_result_as_answer = enabled;
        self
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.image_store
    }

    /// A fresh tool instance for a declared name, or `None` when the name is
    /// not a known tool.
    pub fn build(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let name = name.trim();
        if name.eq_ignore_ascii_case(image_generator::TOOL_NAME) {
            Some(Arc::new(
                ImageGenerator::new(self.image_backend.clone(), self.image_store.clone())
                    .with_result_as_answer(self.image_result_as_answer),
            ))
        } else if name.eq_ignore_ascii_case(code_interpreter::TOOL_NAME) {
            Some(Arc::new(TimeoutCodeInterpreter::new(
                self.code_executor.clone(),
                self.code_timeout,
            )))
        } else {
            debug!("Ignoring unknown tool '{}'", name);
            None
        }
    }

    /// Build every recognized name, dropping the rest.
    pub fn build_all(&self, names: &[String]) -> Vec<Arc<dyn Tool>> {
        names.iter().filter_map(|n| self.build(n)).collect()
    }
}
