use async_trait::async_trait;
use std::sync::Mutex;

use super::prompted::CompletionClient;
use super::types::PolicyError;

/// Completion client that returns a fixed reply and keeps every prompt.
pub(crate) struct ScriptedClient {
    reply: Result<String, PolicyError>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub(crate) fn new(reply: Result<String, PolicyError>) -> Self {
        Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, PolicyError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}
