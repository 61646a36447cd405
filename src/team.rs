use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

type Result<T> = std::result::Result<T, Error>;

/// Every failure collapses into this one; the cause is only logged.
#[derive(Debug, thiserror::Error)]
#[error("Failed to generate team randomization")]
pub struct Error;

#[derive(Clone, Debug, confique::Config)]
pub struct Config {
    /// Base URL of an OpenAI-compatible chat completion API
    #[config(default = "https://openrouter.ai/api/v1")]
    pub api_url: String,

    /// API key sent as a bearer token
    #[config(env = "PIXELCLUTCH_LLM_API_KEY")]
    pub api_key: Option<String>,

    /// Model used for completions
    #[config(default = "openai/gpt-4o")]
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub fn prompt(text: &str) -> String {
    format!(
        "You are a team randomizer. Given the following names and your overalls, randomly \
         assign people to teams. The text is: {text} \n Obs.: Reply this message in JSON format \
         with the following structure: {{ \"teams\": [{{ \"teamName\": \"Team A\", \"members\": \
         [\"Member 1\", \"Member 2\"] }}, {{ \"teamName\": \"Team B\", \"members\": \
         [\"Member 3\", \"Member 4\"] }}] }}. Do not add any other text or explanation."
    )
}

/// Splits participants into teams by asking a language model.
#[derive(Debug, Clone)]
pub struct TeamRandomizer {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl TeamRandomizer {
    pub fn new(config: &Config) -> Self {
        if config.api_key.is_none() {
            tracing::warn!("no language model API key configured, team randomization will fail");
        }

        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Returns the model's reply verbatim. It is asked for JSON but nothing checks that.
    pub async fn randomize(&self, text: &str) -> Result<String> {
        self.complete(text).await.map_err(|e| {
            error!("Error in team randomizer: {e}");
            Error
        })
    }

    async fn complete(&self, text: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.api_url);
        debug!("requesting team randomization from {url} using {}", self.model);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt(text)),
            }],
        };

        let mut builder = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&request);
        if let Some(ref api_key) = self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {api_key}"));
        }

        let response = builder.send().await?.error_for_status()?;
        let completion = response.json::<ChatResponse>().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("completion had no content"))
    }
}

/// The reply shape the prompt asks for.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TeamAssignment {
    pub teams: Vec<Team>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_name: String,
    pub members: Vec<String>,
}

impl TeamAssignment {
    /// Best-effort read of a reply, tolerating a fenced code block around the JSON.
    pub fn parse(reply: &str) -> Option<Self> {
        let trimmed = reply.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .unwrap_or(trimmed);

        serde_json::from_str(body.trim()).ok()
    }
}
