use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::router::IntentClassifier;

/// Classifier backed by a llama-server-style `/completion` endpoint.
#[derive(Clone)]
pub struct HttpClassifier {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct CompletionRequest {
    prompt: String,
    stream: bool,
    n_predict: usize,
    temperature: f32,
    stop: Vec<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: String,
}

impl HttpClassifier {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10)) // hard network-level cap
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl IntentClassifier for HttpClassifier {
    async fn classify(&self, prompt: &str) -> Result<String> {
        let request_body = CompletionRequest {
            prompt: prompt.to_string(),
            stream: false, // one-shot only
            n_predict: 128,
            temperature: 0.2, // classification wants determinism
            stop: vec!["Command:".to_string(), "\n\n".to_string()],
        };

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("LLM server error: {}", response.status()));
        }

        let resp: CompletionResponse = response.json().await?;
        Ok(resp.content.trim().to_string())
    }
}
