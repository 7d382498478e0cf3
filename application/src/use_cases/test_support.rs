//! Scripted gateway shared by the use case tests

use crate::ports::llm_gateway::{GatewayError, LlmGateway, LlmSession};
use async_trait::async_trait;
use moe_domain::ModelRef;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// What a scripted session does when asked
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Plain text completion
    Reply(String),
    /// Gateway error
    Fail(String),
    /// Never answers within any sane timeout
    Hang,
    /// Panics inside the voter task
    Panic,
}

impl Script {
    pub(crate) fn vote(intent: &str, confidence: f64) -> Self {
        Script::Reply(format!(
            r#"{{"intent": "{}", "confidence": {}, "entities": {{}}, "subtasks": [], "reasoning": "scripted"}}"#,
            intent, confidence
        ))
    }
}

struct ScriptedSession {
    model: ModelRef,
    script: Script,
    prompts: std::sync::Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl LlmSession for ScriptedSession {
    fn model(&self) -> &ModelRef {
        &self.model
    }

    async fn send(&self, content: &str) -> Result<String, GatewayError> {
        self.prompts
            .lock()
            .unwrap()
            .push((self.model.model.clone(), content.to_string()));
        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(message) => Err(GatewayError::RequestFailed(message.clone())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            Script::Panic => panic!("scripted voter panic"),
        }
    }
}

/// Mock gateway answering from per-model script queues
///
/// Each session creation pops the next script for the model; an empty
/// queue answers with a backend error.
pub(crate) struct ScriptedGateway {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    calls: Mutex<Vec<String>>,
    prompts: std::sync::Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            prompts: Default::default(),
        }
    }

    pub(crate) fn script(self, model: &str, scripts: Vec<Script>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .extend(scripts);
        self
    }

    /// Number of sessions created for a model
    pub(crate) fn calls_for(&self, model: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| *m == model).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Prompts sent to a model, in order
    pub(crate) fn prompts_for(&self, model: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn create_session_with_system_prompt(
        &self,
        model: &ModelRef,
        _system_prompt: &str,
    ) -> Result<Box<dyn LlmSession>, GatewayError> {
        self.calls.lock().unwrap().push(model.model.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&model.model)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Script::Fail("no scripted response".to_string()));
        Ok(Box::new(ScriptedSession {
            model: model.clone(),
            script,
            prompts: std::sync::Arc::clone(&self.prompts),
        }))
    }
}
