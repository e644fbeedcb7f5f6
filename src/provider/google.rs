use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, Completion, Role};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Part {
    pub text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "LANGUAGE",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini calls the assistant turn "model".
pub(crate) fn to_google_history(history: &[ChatMessage]) -> Vec<Content> {
    history
        .iter()
        .map(|message| Content {
            role: match message.role {
                Role::Assistant => "model",
                Role::User => "user",
            },
            parts: vec![Part {
                text: message.content.clone(),
            }],
        })
        .collect()
}

/// Splits off the last turn, which is sent as the new user message, from the
/// prior context. Returns `None` for an empty history.
pub(crate) fn hold_out_current_turn(mut contents: Vec<Content>) -> Option<(Content, Vec<Content>)> {
    let current = contents.pop()?;
    Some((current, contents))
}

pub struct GoogleCompletion {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GoogleCompletion {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Completion for GoogleCompletion {
    async fn complete(&self, system_prompt: &str, history: &[ChatMessage]) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("GOOGLE_API_KEY environment variable not set")?;

        let (current, mut contents) = hold_out_current_turn(to_google_history(history))
            .context("Cannot start a Gemini chat without a message to send")?;
        let text = current
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
            .unwrap_or_default();
        contents.push(Content {
            role: "user",
            parts: vec![Part { text }],
        });

        let request = GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: system_prompt.to_owned(),
                }],
            },
            contents,
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Google Generative AI API")?
            .error_for_status()
            .context("Google Generative AI API error")?;

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Google Generative AI API response")?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .context("No candidates in Google response")?;

        if let Some(reason) = candidate
            .finish_reason
            .as_deref()
            .filter(|reason| BLOCKING_FINISH_REASONS.contains(reason))
        {
            anyhow::bail!("Candidate was blocked due to {reason}");
        }

        let text: String = candidate
            .content
            .context("No content in Google response")?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        anyhow::ensure!(!text.is_empty(), "No text in Google response");
        Ok(text)
    }
}
