//! Scripted in-memory provider shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ragbot_core::config::Config;
use ragbot_core::provider::Result;
use ragbot_core::{ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, Provider, ProviderError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const VOCABULARY: [&str; 8] = ["sky", "blue", "grass", "green", "color", "the", "is", "what"];

/// Embeds text as word counts over [`VOCABULARY`] and answers by quoting the
/// first passage of the prompt's context.
///
/// Condensation prompts are answered with a fixed standalone question about
/// the grass. Every prompt is recorded.
#[derive(Default)]
pub struct ScriptedProvider {
    pub fail_embeddings: AtomicBool,
    pub slow_chat: AtomicBool,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub fn embed_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; VOCABULARY.len()];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
    {
        if let Some(i) = VOCABULARY.iter().position(|v| *v == word) {
            vector[i] += 1.0;
        }
    }
    vector
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let prompt = request.messages[0].content.clone();
        self.prompts.lock().unwrap().push(prompt.clone());

        if self.slow_chat.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }

        let content = if prompt.starts_with("Given the following conversation") {
            "What color is the grass?".to_string()
        } else {
            let context = prompt
                .split_once("Context: ")
                .and_then(|(_, rest)| rest.split("\n\n").next())
                .unwrap_or("");
            format!("According to the documents: {context}")
        };
        Ok(ChatResponse {
            model: request.model,
            content,
        })
    }

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        if self.fail_embeddings.load(Ordering::SeqCst) {
            return Err(ProviderError::Timeout {
                provider: "scripted".into(),
                timeout: Duration::from_secs(30),
            });
        }
        Ok(EmbedResponse {
            model: request.model,
            embeddings: request.input.iter().map(|t| embed_words(t)).collect(),
        })
    }
}

/// A configuration whose documents and index live under `root`.
pub fn config_in(root: &Path) -> Config {
    let mut config = Config::default();
    config.embedding.dimension = VOCABULARY.len();
    config.storage.documents_dir = root.join("documents");
    config.storage.index_path = root.join("vectorstore/index.rbix");
    config
}

pub fn write_documents(config: &Config, documents: &[(&str, &str)]) {
    let dir = &config.storage.documents_dir;
    std::fs::create_dir_all(dir).unwrap();
    for (name, content) in documents {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

pub fn write_sky_and_grass(config: &Config) {
    write_documents(config, &[("a_sky.txt", "The sky is blue."), ("b_grass.txt", "Grass is green.")]);
}
