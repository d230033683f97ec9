use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::Tool;

pub const TOOL_NAME: &str = "CodeInterpreter";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub const TIMEOUT_MESSAGE: &str =
    "Code execution timed out. Please simplify your code or break it into smaller parts.";

/// Runs a code snippet and returns what it printed.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, code: &str, libraries: &[String]) -> Result<String>;
}

/// Runs code through a local interpreter process (`python3 -c <code>` by
/// default). The child is killed when the execution future is dropped.
pub struct ProcessCodeExecutor {
    program: String,
    leading_args: Vec<String>,
}

impl ProcessCodeExecutor {
    /// `argv` is the interpreter command line; the code becomes its last
    /// argument. An empty argv falls back to `python3 -c`.
    pub fn new(argv: &[String]) -> Self {
        match argv.split_first() {
            Some((program, rest)) => Self {
                program: program.clone(),
                leading_args: rest.to_vec(),
            },
            None => Self {
                program: "python3".to_string(),
                leading_args: vec!["-c".to_string()],
            },
        }
    }
}

#[async_trait]
impl CodeExecutor for ProcessCodeExecutor {
    async fn execute(&self, code: &str, libraries: &[String]) -> Result<String> {
        if !libraries.is_empty() {
            info!("Code declares libraries: {}", libraries.join(", "));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg(code)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();

        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Interpreter exited with {}: {} {}",
                output.status,
                err.trim(),
                stdout.trim()
            ));
        }

        Ok(stdout)
    }
}

/// Code tool that gives up on a snippet after a fixed time budget.
pub struct TimeoutCodeInterpreter {
    executor: Arc<dyn CodeExecutor>,
    timeout: Duration,
}

impl TimeoutCodeInterpreter {
    pub fn new(executor: Arc<dyn CodeExecutor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    pub fn with_default_timeout(executor: Arc<dyn CodeExecutor>) -> Self {
        Self::new(executor, DEFAULT_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `code` on a separate task. On timeout the task is aborted, which
    /// drops (and so kills) any interpreter process it started.
    pub async fn run_code(&self, code: String, libraries: Vec<String>) -> String {
        let executor = self.executor.clone();
        let mut handle = tokio::spawn(async move { executor.execute(&code, &libraries).await });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(out))) => out,
            Ok(Ok(Err(e))) => format!("Error executing code: {}", e),
            Ok(Err(join_err)) => {
                warn!("Code execution worker failed: {}", join_err);
                format!("Error executing code: {}", join_err)
            }
            Err(_) => {
                handle.abort();
                warn!(
                    "Code execution exceeded {}s, worker aborted",
                    self.timeout.as_secs_f32()
                );
                TIMEOUT_MESSAGE.to_string()
            }
        }
    }
}

fn parse_input(input: &Value) -> Option<(String, Vec<String>)> {
    match input {
        Value::String(code) => Some((code.clone(), Vec::new())),
        Value::Object(map) => {
            let code = map.get("code")?.as_str()?.to_string();
            let libraries = map
                .get("libraries_used")
                .and_then(Value::as_array)
                .map(|libs| {
                    libs.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            Some((code, libraries))
        }
        _ => None,
    }
}

#[async_trait]
impl Tool for TimeoutCodeInterpreter {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Executes a Python 3 snippet and returns what it printed. Print any value you need to see."
    }

    fn usage(&self) -> &str {
        r#"{"code": "<python source>", "libraries_used": ["<module>"]}"#
    }

    async fn run(&self, input: Value) -> String {
        match parse_input(&input) {
            Some((code, _)) if code.trim().is_empty() => {
                "Error executing code: no code provided".to_string()
            }
            Some((code, libraries)) => self.run_code(code, libraries).await,
            None => "Error executing code: expected {\"code\": \"...\"}".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    struct SlowExecutor {
        delay: Duration,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl CodeExecutor for SlowExecutor {
        async fn execute(&self, _code: &str, _libraries: &[String]) -> Result<String> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok("late".to_string())
        }
    }

    struct FailingExecutor;

    #[async_trait]
    impl CodeExecutor for FailingExecutor {
        async fn execute(&self, _code: &str, _libraries: &[String]) -> Result<String> {
            Err(anyhow::anyhow!("NameError: name 'x' is not defined"))
        }
    }

    struct PanickingExecutor;

    #[async_trait]
    impl CodeExecutor for PanickingExecutor {
        async fn execute(&self, _code: &str, _libraries: &[String]) -> Result<String> {
            panic!("executor blew up");
        }
    }

    #[tokio::test]
    async fn slow_code_times_out_near_the_budget() {
        let finished = Arc::new(AtomicBool::new(false));
        let tool = TimeoutCodeInterpreter::new(
            Arc::new(SlowExecutor {
                delay: Duration::from_millis(600),
                finished: finished.clone(),
            }),
            Duration::from_millis(300),
        );

        let started = Instant::now();
        let out = tool.run(json!({"code": "while True: pass"})).await;
        let elapsed = started.elapsed();

        assert_eq!(out, TIMEOUT_MESSAGE);
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_millis(550), "took {:?}", elapsed);

        // The aborted worker never completes.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn fast_code_returns_output() {
        let tool = TimeoutCodeInterpreter::with_default_timeout(Arc::new(
            crate::core::tools::testing::EchoExecutor,
        ));
        assert_eq!(tool.timeout(), Duration::from_secs(120));
        let out = tool
            .run(json!({"code": "print(1)", "libraries_used": ["math"]}))
            .await;
        assert_eq!(out, "ran: print(1)");
    }

    #[tokio::test]
    async fn bare_string_input_is_code() {
        let tool = TimeoutCodeInterpreter::with_default_timeout(Arc::new(
            crate::core::tools::testing::EchoExecutor,
        ));
        assert_eq!(tool.run(json!("print(2)")).await, "ran: print(2)");
    }

    #[tokio::test]
    async fn executor_errors_become_text() {
        let tool = TimeoutCodeInterpreter::new(Arc::new(FailingExecutor), Duration::from_secs(1));
        let out = tool.run(json!({"code": "x"})).await;
        assert!(out.starts_with("Error executing code: "));
        assert!(out.contains("NameError"));
    }

    #[tokio::test]
    async fn worker_panics_become_text() {
        let tool = TimeoutCodeInterpreter::new(Arc::new(PanickingExecutor), Duration::from_secs(1));
        let out = tool.run(json!({"code": "boom"})).await;
        assert!(out.starts_with("Error executing code: "));
    }

    #[tokio::test]
    async fn malformed_input_is_reported() {
        let tool = TimeoutCodeInterpreter::new(Arc::new(FailingExecutor), Duration::from_secs(1));
        assert!(tool.run(json!({"source": "x"})).await.starts_with("Error executing code"));
        assert!(tool.run(json!({"code": "  "})).await.contains("no code provided"));
    }

    #[test]
    fn process_executor_splits_argv() {
        let exec = ProcessCodeExecutor::new(&["python".to_string(), "-c".to_string()]);
        assert_eq!(exec.program, "python");
        assert_eq!(exec.leading_args, vec!["-c"]);
        let fallback = ProcessCodeExecutor::new(&[]);
        assert_eq!(fallback.program, "python3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_executor_captures_stdout_and_failures() {
        let exec = ProcessCodeExecutor::new(&["sh".to_string(), "-c".to_string()]);
        let out = exec.execute("echo hello", &[]).await.unwrap();
        assert_eq!(out.trim(), "hello");
        let err = exec.execute("echo oops >&2; exit 3", &[]).await.unwrap_err();
        assert!(err.to_string().contains("oops"));
    }
}
