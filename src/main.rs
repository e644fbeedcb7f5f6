mod handler;
mod persona;
mod provider;

use anyhow::Context;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;
use tracing::info;

use crate::handler::AppState;
use crate::persona::Persona;
use crate::provider::google::GoogleCompletion;
use crate::provider::openai::OpenAiCompletion;

#[derive(Deserialize, Debug)]
struct Environment {
    openai_api_key: Option<String>,
    google_api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    openai_base_url: String,
    #[serde(default = "default_google_base_url")]
    google_base_url: String,
    #[serde(default = "default_openai_model")]
    openai_model: String,
    #[serde(default = "default_google_model")]
    google_model: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_owned()
}

fn default_google_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_owned()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_owned()
}

fn default_google_model() -> String {
    "gemini-1.5-flash".to_owned()
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "persona-chat-relay",
    about = "Relay a chat conversation to OpenAI or Google with a fixed persona"
)]
struct Args {
    /// Address to listen on
    #[structopt(short, long, default_value = "0.0.0.0:3000")]
    listen: SocketAddr,

    /// Path to a persona TOML file replacing the built-in one
    #[structopt(short, long)]
    persona: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let environment = envy::from_env::<Environment>()?;
    let args = Args::from_args();

    let persona = match &args.persona {
        Some(path) => Persona::from_file(path).await?,
        None => Persona::embedded()?,
    };
    info!(topics = persona.topics.len(), "Loaded persona");

    let state = AppState::new(
        persona.system_prompt(),
        Arc::new(OpenAiCompletion::new(
            environment.openai_base_url,
            environment.openai_api_key,
            environment.openai_model,
        )),
        Arc::new(GoogleCompletion::new(
            environment.google_base_url,
            environment.google_api_key,
            environment.google_model,
        )),
    );

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("Listening on {}, POST /api/chat", args.listen);

    axum::serve(listener, handler::router(state)).await?;

    Ok(())
}
