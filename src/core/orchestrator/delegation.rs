use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::agent::RunnableAgent;
use crate::core::brain::{AgentBrain, Delegator};
use crate::core::llm::ModelHandle;

pub const IMPLICIT_MANAGER_ROLE: &str = "Crew Manager";

/// Manager persona used when no mission agent is flagged for delegation.
pub fn implicit_manager(model: ModelHandle) -> RunnableAgent {
    RunnableAgent {
        record_id: String::new(),
        role: IMPLICIT_MANAGER_ROLE.to_string(),
        goal: "Manage the team to complete each task to the highest standard.".to_string(),
        backstory: "You are a seasoned manager with a knack for getting the best out of your \
                    team. You break work down, hand each piece to the coworker best suited \
                    for it, and check their results before answering."
            .to_string(),
        allow_delegation: true,
        verbose: true,
        model,
        tools: Vec::new(),
    }
}

/// The agents a manager can hand work to. Coworkers run through the brain
/// with their own tools and without delegation rights.
pub struct CoworkerPool<'a> {
    coworkers: Vec<&'a RunnableAgent>,
    brain: &'a AgentBrain,
}

impl<'a> CoworkerPool<'a> {
    /// Every agent in `agents` except the manager's own record.
    pub fn new(agents: &'a [RunnableAgent], manager: &RunnableAgent, brain: &'a AgentBrain) -> Self {
        let coworkers = agents
            .iter()
            .filter(|a| manager.record_id.is_empty() || a.record_id != manager.record_id)
            .collect();
        Self { coworkers, brain }
    }

    pub fn len(&self) -> usize {
        self.coworkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coworkers.is_empty()
    }

    fn find(&self, name: &str) -> Option<&'a RunnableAgent> {
        let wanted = name.trim().trim_matches(|c| c == '"' || c == '\'');
        self.coworkers
            .iter()
            .copied()
            .find(|a| a.role.trim().eq_ignore_ascii_case(wanted))
    }

    fn unknown(&self, name: &str) -> String {
        warn!("Manager addressed unknown coworker '{}'", name);
        format!(
            "Error: there is no coworker named '{}'. Choose one of: {}",
            name,
            self.coworker_roles().join(", ")
        )
    }

    async fn consult(&self, coworker: &RunnableAgent, request: &str, context: &str) -> Result<String> {
        let prompt = if context.trim().is_empty() {
            request.to_string()
        } else {
            format!("{}\n\nThis is the context you're working with:\n{}", request, context)
        };
        self.brain
            .execute(coworker, &prompt, &coworker.tools, None)
            .await
    }
}

#[async_trait]
impl<'a> Delegator for CoworkerPool<'a> {
    fn coworker_roles(&self) -> Vec<String> {
        self.coworkers.iter().map(|a| a.role.clone()).collect()
    }

    async fn delegate_work(&self, coworker: &str, task: &str, context: &str) -> Result<String> {
        let Some(agent) = self.find(coworker) else {
            return Ok(self.unknown(coworker));
        };
        info!("Delegating work to {}", agent.role);
        self.consult(agent, task, context).await
    }

    async fn ask_question(&self, coworker: &str, question: &str, context: &str) -> Result<String> {
        let Some(agent) = self.find(coworker) else {
            return Ok(self.unknown(coworker));
        };
        info!("Asking {} a question", agent.role);
        self.consult(agent, question, context).await
    }
}
