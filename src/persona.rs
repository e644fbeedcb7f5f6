use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const EMBEDDED_PERSONA: &str = include_str!("../persona.toml");

/// Persona instructions plus the knowledge base the model is told to treat as
/// its only source of truth.
#[derive(Debug, Clone, Deserialize)]
pub struct Persona {
    pub template: String,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Topic {
    pub key: String,
    pub text: String,
}

impl Persona {
    pub fn embedded() -> Result<Self> {
        toml::from_str(EMBEDDED_PERSONA).context("Failed to parse embedded persona TOML")
    }

    pub async fn from_file(path: &Path) -> Result<Self> {
        toml::from_str(
            &tokio::fs::read_to_string(path)
                .await
                .context("Failed to read persona file")?,
        )
        .context("Failed to parse persona TOML")
    }

    pub fn system_prompt(&self) -> String {
        let knowledge: String = self
            .topics
            .iter()
            .map(|topic| format!("- {}: {}\n", capitalize(&topic.key), topic.text))
            .collect();

        format!(
            "{}\n\n**CONTEXT KNOWLEDGE BASE:**\n---\n{knowledge}---",
            self.template
        )
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalizes_only_the_first_character() {
        assert_eq!(capitalize("youtube"), "Youtube");
        assert_eq!(capitalize("bIo"), "BIo");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn embedded_persona_keeps_topic_order() {
        let persona = Persona::embedded().unwrap();
        let keys: Vec<_> = persona.topics.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(
            keys,
            ["bio", "education", "career", "youtube", "philosophy", "fitness"]
        );
    }

    #[test]
    fn system_prompt_contains_every_topic() {
        let persona = Persona::embedded().unwrap();
        let prompt = persona.system_prompt();

        assert!(prompt.starts_with("You are an AI assistant role-playing as Rohit Negi."));
        for topic in &persona.topics {
            let line = format!("- {}: {}\n", capitalize(&topic.key), topic.text);
            assert!(prompt.contains(&line), "missing line for {}", topic.key);
        }
        assert!(prompt.contains("https://www.youtube.com/@CoderArmy"));
        assert!(prompt.ends_with("sharp mind.\n---"));
    }

    #[test]
    fn system_prompt_layout() {
        let persona = Persona {
            template: "Be brief.".to_owned(),
            topics: vec![
                Topic {
                    key: "alpha".to_owned(),
                    text: "First.".to_owned(),
                },
                Topic {
                    key: "beta".to_owned(),
                    text: "Second.".to_owned(),
                },
            ],
        };

        assert_eq!(
            persona.system_prompt(),
            "Be brief.\n\n**CONTEXT KNOWLEDGE BASE:**\n---\n- Alpha: First.\n- Beta: Second.\n---"
        );
    }

    #[tokio::test]
    async fn missing_persona_file_is_an_error() {
        let err = Persona::from_file(Path::new("/nonexistent/persona.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read persona file"));
    }
}
