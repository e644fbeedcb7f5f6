use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Completion, Role};

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

fn messages<'a>(system_prompt: &'a str, history: &'a [ChatMessage]) -> Vec<Message<'a>> {
    std::iter::once(Message {
        role: "system",
        content: system_prompt,
    })
    .chain(history.iter().map(|message| Message {
        role: match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: &message.content,
    }))
    .collect()
}

#[async_trait]
impl Completion for OpenAiCompletion {
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("OPENAI_API_KEY environment variable not set")?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: messages(system_prompt, history),
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?
            .error_for_status()
            .context("OpenAI API error")?;

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .into_iter()
            .next()
            .context("No choices in OpenAI response")?
            .message
            .content
            .context("No content in OpenAI response")
    }
}
