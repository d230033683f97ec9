use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use crate::core::agent::RunnableAgent;
use crate::core::llm::ChatMessage;
use crate::core::tools::Tool;

pub const DEFAULT_MAX_ITERATIONS: usize = 15;

pub const DELEGATE_WORK: &str = "delegate_work";
pub const ASK_QUESTION: &str = "ask_question";

static INVOKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<invoke\s+name\s*=\s*["']([^"']+)["']\s*>([\s\S]*?)</invoke>"#)
        .expect("invoke regex is valid")
});

/// Strip `<invoke>` tags from untrusted text to prevent prompt injection.
/// Tool results and coworker answers are sanitized before being fed back into
/// the loop.
pub fn sanitize_invoke_tags(text: &str) -> String {
    INVOKE_RE
        .replace_all(text, "[invoke tag removed for security]")
        .to_string()
}

/// First `<invoke>` in a response: the trimmed name and the raw argument text.
pub fn parse_invocation(text: &str) -> Option<(String, String)> {
    let captures = INVOKE_RE.captures(text)?;
    let name = captures.get(1)?.as_str().trim().to_string();
    let args = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    Some((name, args.to_string()))
}

/// Arguments are JSON when they parse, otherwise the raw string.
fn parse_arguments(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// The answer part of a final response: everything after the last
/// `Final Answer:` marker, with any stray invoke tags removed.
pub fn final_answer(response: &str) -> String {
    let cleaned = INVOKE_RE.replace_all(response, "");
    let answer = match cleaned.rfind("Final Answer:") {
        Some(idx) => &cleaned[idx + "Final Answer:".len()..],
        None => &cleaned[..],
    };
    answer.trim().to_string()
}

/// Hands work to other agents on behalf of a managing agent.
#[async_trait]
pub trait Delegator: Send + Sync {
    /// Roles the manager may address.
    fn coworker_roles(&self) -> Vec<String>;

    async fn delegate_work(&self, coworker: &str, task: &str, context: &str) -> Result<String>;

    async fn ask_question(&self, coworker: &str, question: &str, context: &str) -> Result<String>;
}

fn build_system_prompt(
    agent: &RunnableAgent,
    tools: &[Arc<dyn Tool>],
    delegator: Option<&dyn Delegator>,
) -> String {
    let mut prompt = format!(
        "You are {}. {}\nYour personal goal is: {}\n\n",
        agent.role, agent.backstory, agent.goal
    );

    if tools.is_empty() && delegator.is_none() {
        prompt.push_str(
            "You have no tools. Work out the answer yourself and reply with it directly.\n\
             Begin your reply with \"Final Answer:\" followed by the complete answer.\n",
        );
        return prompt;
    }

    prompt.push_str(
        "RULES:\n\
         1. Only use the tools listed in AVAILABLE TOOLS. Never invent tool names.\n\
         2. Invoke at most one tool per response, then STOP and wait for the result.\n\
         3. When you have everything you need, reply WITHOUT an <invoke> tag, starting with \
            \"Final Answer:\" followed by the complete answer.\n\n\
         TOOL INVOCATION FORMAT:\n\
         <invoke name=\"tool_name\">{\"arg\": \"value\"}</invoke>\n\
         Arguments MUST be a JSON object matching the tool's usage.\n\n\
         --- AVAILABLE TOOLS ---\n",
    );

    for tool in tools {
        prompt.push_str(&format!(
            "- {}: {}\n  usage: {}\n",
            tool.name(),
            tool.description(),
            tool.usage()
        ));
    }

    if let Some(delegator) = delegator {
        let roles = delegator.coworker_roles().join(", ");
        prompt.push_str(&format!(
            "- {}: Delegate a specific piece of work to one of your coworkers: {}. \
             Give them everything they need; they know nothing about the task otherwise.\n  \
             usage: {{\"coworker\": \"<role>\", \"task\": \"<what to do>\", \"context\": \"<all relevant context>\"}}\n",
            DELEGATE_WORK, roles
        ));
        prompt.push_str(&format!(
            "- {}: Ask a question to one of your coworkers: {}.\n  \
             usage: {{\"coworker\": \"<role>\", \"question\": \"<your question>\", \"context\": \"<all relevant context>\"}}\n",
            ASK_QUESTION, roles
        ));
    }

    prompt.push_str("--- END OF TOOLS ---\n");
    prompt
}

fn response_hash(text: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Outcome of acting on one invocation.
struct Observation {
    text: String,
    is_answer: bool,
}

/// The reasoning loop an agent runs for one piece of work.
#[derive(Debug, Clone)]
pub struct AgentBrain {
    max_iterations: usize,
}

impl Default for AgentBrain {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl AgentBrain {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Work on `prompt` as `agent` until it produces a final answer.
    ///
    /// Model failures propagate; tool failures come back to the model as text.
    pub async fn execute(
        &self,
        agent: &RunnableAgent,
        prompt: &str,
        tools: &[Arc<dyn Tool>],
        delegator: Option<&dyn Delegator>,
    ) -> Result<String> {
        let mut messages = vec![
            ChatMessage::system(build_system_prompt(agent, tools, delegator)),
            ChatMessage::user(prompt),
        ];
        let mut last_hash: Option<u64> = None;
        let mut last_observation: Option<String> = None;

        for iter in 1..=self.max_iterations {
            let response = agent.model.generate(&messages).await?;
            if agent.verbose {
                info!(agent = %agent.role, "Brain iter {}: {} chars", iter, response.len());
            }

            let current_hash = response_hash(&response);
            if last_hash == Some(current_hash) {
                info!(agent = %agent.role, "Identical response at iter {}, stopping", iter);
                let answer = final_answer(&response);
                return Ok(match last_observation {
                    Some(obs) if answer.is_empty() => obs,
                    _ => answer,
                });
            }
            last_hash = Some(current_hash);

            let Some((name, raw_args)) = parse_invocation(&response) else {
                return Ok(final_answer(&response));
            };

            messages.push(ChatMessage::assistant(response.clone()));
            let args = parse_arguments(&raw_args);
            let observation = self.act(agent, &name, args, tools, delegator).await?;
            if observation.is_answer {
                info!(agent = %agent.role, "Tool '{}' output taken as the final answer", name);
                return Ok(observation.text);
            }

            let safe = sanitize_invoke_tags(&observation.text);
            messages.push(ChatMessage::system(format!(
                "TOOL RESULT [{}]:\n{}\n\nContinue with the task. If it is complete, give your final answer.",
                name, safe
            )));
            last_observation = Some(safe);
        }

        warn!(
            agent = %agent.role,
            "Iteration limit of {} reached, asking for a final answer",
            self.max_iterations
        );
        messages.push(ChatMessage::system(
            "You have run out of steps. Do not invoke any more tools. \
             Give your best final answer now, starting with \"Final Answer:\".",
        ));
        let response = agent.model.generate(&messages).await?;
        Ok(final_answer(&response))
    }

    async fn act(
        &self,
        agent: &RunnableAgent,
        name: &str,
        args: Value,
        tools: &[Arc<dyn Tool>],
        delegator: Option<&dyn Delegator>,
    ) -> Result<Observation> {
        if let Some(delegator) = delegator
            && (name.eq_ignore_ascii_case(DELEGATE_WORK) || name.eq_ignore_ascii_case(ASK_QUESTION))
        {
            let text = delegate(delegator, name, &args).await?;
            return Ok(Observation {
                text,
                is_answer: false,
            });
        }

        match tools.iter().find(|t| t.name().eq_ignore_ascii_case(name)) {
            Some(tool) => {
                debug!(agent = %agent.role, "Invoking tool {} with {}", tool.name(), args);
                let text = tool.run(args).await;
                let is_answer = tool.answers_with(&text);
                Ok(Observation { text, is_answer })
            }
            None => {
                warn!(agent = %agent.role, "Model invoked unknown tool '{}'", name);
                let available: Vec<&str> = tools.iter().map(|t| t.name()).collect();
                Ok(Observation {
                    text: format!(
                        "Tool '{}' does not exist. Available tools: {}",
                        name,
                        if available.is_empty() {
                            "none".to_string()
                        } else {
                            available.join(", ")
                        }
                    ),
                    is_answer: false,
                })
            }
        }
    }
}

fn field<'a>(args: &'a Value, key: &str) -> &'a str {
    args.get(key).and_then(Value::as_str).unwrap_or_default()
}

async fn delegate(delegator: &dyn Delegator, action: &str, args: &Value) -> Result<String> {
    let coworker = field(args, "coworker").trim();
    if coworker.is_empty() {
        return Ok(format!(
            "The {} action needs a \"coworker\". Choose one of: {}",
            action,
            delegator.coworker_roles().join(", ")
        ));
    }
    let context = field(args, "context");

    if action.eq_ignore_ascii_case(DELEGATE_WORK) {
        let task = field(args, "task");
        if task.trim().is_empty() {
            return Ok("The delegate_work action needs a \"task\".".to_string());
        }
        delegator.delegate_work(coworker, task, context).await
    } else {
        let question = field(args, "question");
        if question.trim().is_empty() {
            return Ok("The ask_question action needs a \"question\".".to_string());
        }
        delegator.ask_question(coworker, question, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::testing::{ScriptedProvider, handle, system_prompt};
    use crate::core::tools::testing::registry;
    use std::sync::Mutex;

    fn agent(provider: &Arc<ScriptedProvider>, tools: Vec<Arc<dyn Tool>>) -> RunnableAgent {
        RunnableAgent {
            record_id: "a1".to_string(),
            role: "Programmer".to_string(),
            goal: "Write game code".to_string(),
            backstory: "Ships fast.".to_string(),
            allow_delegation: false,
            verbose: true,
            model: handle(provider),
            tools,
        }
    }

    #[test]
    fn sanitize_invoke_tags_removes_tags() {
        let text = r#"ok <invoke name="CodeInterpreter">{"code": "x"}</invoke> done"#;
        assert_eq!(
            sanitize_invoke_tags(text),
            "ok [invoke tag removed for security] done"
        );
    }

    #[test]
    fn parse_invocation_reads_name_and_args() {
        let (name, args) =
            parse_invocation("Let me draw.\n<invoke name='ImageGenerator'> {\"prompt\": \"a cat\"} </invoke>")
                .unwrap();
        assert_eq!(name, "ImageGenerator");
        assert_eq!(args, "{\"prompt\": \"a cat\"}");
        assert!(parse_invocation("no tools here").is_none());
    }

    #[test]
    fn non_json_arguments_fall_back_to_text() {
        assert_eq!(parse_arguments("print(1)"), Value::String("print(1)".to_string()));
        assert!(parse_arguments("").is_object());
        assert_eq!(parse_arguments("{\"code\": \"x\"}")["code"], "x");
    }

    #[test]
    fn final_answer_strips_marker() {
        assert_eq!(final_answer("Thought: done\nFinal Answer: 42"), "42");
        assert_eq!(final_answer("  plain text  "), "plain text");
    }

    #[tokio::test]
    async fn plain_response_is_the_answer() {
        let provider = ScriptedProvider::new(["Final Answer: A platformer about frogs."]);
        let brain = AgentBrain::default();
        let out = brain
            .execute(&agent(&provider, vec![]), "Pitch a game", &[], None)
            .await
            .unwrap();
        assert_eq!(out, "A platformer about frogs.");
        assert!(system_prompt(&provider.calls()[0]).contains("You are Programmer."));
    }

    #[tokio::test]
    async fn tool_result_is_fed_back() {
        let dir = tempfile::tempdir().unwrap();
        let tools = registry(dir.path()).build_all(&["CodeInterpreter".to_string()]);
        let provider = ScriptedProvider::new([
            r#"<invoke name="CodeInterpreter">{"code": "print(6*7)"}</invoke>"#,
            "Final Answer: done",
        ]);
        let a = agent(&provider, tools.clone());
        let out = AgentBrain::default()
            .execute(&a, "Compute", &tools, None)
            .await
            .unwrap();
        assert_eq!(out, "done");
        let second = &provider.calls()[1];
        let last = second.last().unwrap();
        assert_eq!(last.role, "system");
        assert!(last.content.contains("TOOL RESULT [CodeInterpreter]"));
        assert!(last.content.contains("ran: print(6*7)"));
    }

    #[tokio::test]
    async fn result_as_answer_tool_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let tools = registry(dir.path()).build_all(&["ImageGenerator".to_string()]);
        let provider =
            ScriptedProvider::new([r#"<invoke name="ImageGenerator">{"prompt": "a hero"}</invoke>"#]);
        let a = agent(&provider, tools.clone());
        let out = AgentBrain::default()
            .execute(&a, "Draw", &tools, None)
            .await
            .unwrap();
        let marker: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(marker["type"], "image");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn image_tool_failure_lets_the_agent_retry() {
        let dir = tempfile::tempdir().unwrap();
        let tools = registry(dir.path()).build_all(&["ImageGenerator".to_string()]);
        let too_long = format!(
            r#"<invoke name="ImageGenerator">{{"prompt": "{}"}}</invoke>"#,
            "a".repeat(501)
        );
        let provider = ScriptedProvider::new([
            too_long,
            r#"<invoke name="ImageGenerator">{"prompt": "a short hero"}</invoke>"#.to_string(),
        ]);
        let a = agent(&provider, tools.clone());
        let out = AgentBrain::default()
            .execute(&a, "Draw", &tools, None)
            .await
            .unwrap();

        let marker: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(marker["type"], "image");
        assert_eq!(provider.call_count(), 2);
        let feedback = provider.calls()[1].last().unwrap().content.clone();
        assert!(feedback.contains("Prompt exceeds 500 characters"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let provider = ScriptedProvider::new([
            r#"<invoke name="WebSearch">{"q": "x"}</invoke>"#,
            "Final Answer: fine",
        ]);
        let out = AgentBrain::default()
            .execute(&agent(&provider, vec![]), "Search", &[], None)
            .await
            .unwrap();
        assert_eq!(out, "fine");
        let feedback = provider.calls()[1].last().unwrap().content.clone();
        assert!(feedback.contains("Tool 'WebSearch' does not exist"));
    }

    #[tokio::test]
    async fn iteration_limit_forces_a_final_answer() {
        let provider = ScriptedProvider::with_responder(|messages| {
            if messages.last().is_some_and(|m| m.content.contains("run out of steps")) {
                Ok("Final Answer: best effort".to_string())
            } else {
                Ok(format!(
                    r#"<invoke name="Nope">{{"n": {}}}</invoke>"#,
                    messages.len()
                ))
            }
        });
        let out = AgentBrain::new(3)
            .execute(&agent(&provider, vec![]), "Loop", &[], None)
            .await
            .unwrap();
        assert_eq!(out, "best effort");
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn identical_responses_stop_the_loop() {
        let provider = ScriptedProvider::with_responder(|_| {
            Ok(r#"<invoke name="Nope">{}</invoke>"#.to_string())
        });
        let out = AgentBrain::default()
            .execute(&agent(&provider, vec![]), "Loop", &[], None)
            .await
            .unwrap();
        assert_eq!(provider.call_count(), 2);
        assert!(out.contains("does not exist"));
    }

    #[tokio::test]
    async fn model_errors_propagate() {
        let provider = ScriptedProvider::failing();
        let err = AgentBrain::default()
            .execute(&agent(&provider, vec![]), "Anything", &[], None)
            .await
            .unwrap_err();
        let mission_err = crate::core::error::MissionError::from_anyhow(err);
        assert_eq!(mission_err.http_status(), 503);
    }

    struct RecordingDelegator {
        calls: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Delegator for RecordingDelegator {
        fn coworker_roles(&self) -> Vec<String> {
            vec!["Artist".to_string()]
        }

        async fn delegate_work(&self, coworker: &str, task: &str, context: &str) -> Result<String> {
            self.calls.lock().unwrap().push((
                coworker.to_string(),
                task.to_string(),
                context.to_string(),
            ));
            Ok("sprites drawn".to_string())
        }

        async fn ask_question(&self, coworker: &str, question: &str, _context: &str) -> Result<String> {
            Ok(format!("{} says: blue, to '{}'", coworker, question))
        }
    }

    #[tokio::test]
    async fn delegation_actions_reach_the_delegator() {
        let delegator = RecordingDelegator {
            calls: Mutex::new(Vec::new()),
        };
        let provider = ScriptedProvider::new([
            r#"<invoke name="delegate_work">{"coworker": "Artist", "task": "Draw sprites", "context": "8-bit"}</invoke>"#,
            r#"<invoke name="ask_question">{"coworker": "Artist", "question": "Palette?"}</invoke>"#,
            "Final Answer: assembled",
        ]);
        let out = AgentBrain::default()
            .execute(&agent(&provider, vec![]), "Ship it", &[], Some(&delegator))
            .await
            .unwrap();
        assert_eq!(out, "assembled");
        let calls = delegator.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(
                "Artist".to_string(),
                "Draw sprites".to_string(),
                "8-bit".to_string()
            )]
        );
        let system = system_prompt(&provider.calls()[0]).to_string();
        assert!(system.contains("delegate_work"));
        assert!(system.contains("Artist"));
        let feedback = provider.calls()[2].last().unwrap().content.clone();
        assert!(feedback.contains("Artist says: blue"));
    }

    #[tokio::test]
    async fn delegation_without_coworker_is_reported() {
        let delegator = RecordingDelegator {
            calls: Mutex::new(Vec::new()),
        };
        let provider = ScriptedProvider::new([
            r#"<invoke name="delegate_work">{"task": "Draw"}</invoke>"#,
            "Final Answer: ok",
        ]);
        AgentBrain::default()
            .execute(&agent(&provider, vec![]), "Ship it", &[], Some(&delegator))
            .await
            .unwrap();
        let feedback = provider.calls()[1].last().unwrap().content.clone();
        assert!(feedback.contains("needs a \"coworker\""));
        assert!(delegator.calls.lock().unwrap().is_empty());
    }
}
