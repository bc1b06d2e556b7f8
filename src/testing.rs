//! Scripted test doubles for the provider and agent seams

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::ai::agent::AnalysisAgent;
use crate::ai::provider::{LlmProvider, LlmResponse};
use crate::types::{DeckError, Result};

/// Provider replaying a fixed list of responses; the last entry repeats
pub struct ScriptedProvider {
    script: Vec<std::result::Result<Value, String>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<std::result::Result<Value, String>>) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, prompt: &str, _schema: &Value) -> Result<LlmResponse> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.prompts.lock().unwrap().push(prompt.to_string());
        match next_entry(&self.script, idx) {
            Ok(value) => Ok(LlmResponse::content_only(value)),
            Err(message) => Err(DeckError::LlmApi(message)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }
}

/// Agent replaying a fixed list of replies; the last entry repeats
pub struct ScriptedAgent {
    script: Vec<std::result::Result<String, String>>,
    calls: AtomicU32,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(script: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            script,
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisAgent for ScriptedAgent {
    async fn query(&self, prompt: &str) -> Result<String> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.prompts.lock().unwrap().push(prompt.to_string());
        next_entry(&self.script, idx).map_err(DeckError::Agent)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn next_entry<T: Clone>(
    script: &[std::result::Result<T, String>],
    idx: usize,
) -> std::result::Result<T, String> {
    script
        .get(idx)
        .or_else(|| script.last())
        .cloned()
        .unwrap_or_else(|| Err("script is empty".to_string()))
}
