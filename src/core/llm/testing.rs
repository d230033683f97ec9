//! In-process model fakes for unit tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{ChatMessage, LlmProvider, ModelHandle};
use crate::core::error::MissionError;

type Responder = dyn Fn(&[ChatMessage]) -> Result<String> + Send + Sync;

/// Replays queued replies (or asks a responder closure) and records every
/// conversation it was sent.
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    responder: Option<Box<Responder>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub(crate) fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            responder: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn with_responder<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&[ChatMessage]) -> Result<String> + Send + Sync + 'static,
    {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A provider whose every call fails like an unreachable backend.
    pub(crate) fn failing() -> Arc<Self> {
        Self::with_responder(|_| Err(MissionError::upstream(Some(503), "model unavailable").into()))
    }

    pub(crate) fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _model_id: &str, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if let Some(ref responder) = self.responder {
            return responder(messages);
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted provider ran out of replies"))
    }
}

pub(crate) fn handle(provider: &Arc<ScriptedProvider>) -> ModelHandle {
    ModelHandle::new(provider.clone(), "scripted-model")
}

/// The user-role prompt of a conversation (the task or delegation request).
pub(crate) fn user_prompt(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

/// The system prompt of a conversation (persona and tool catalog).
pub(crate) fn system_prompt(messages: &[ChatMessage]) -> &str {
    messages
        .first()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}
