use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, warn};

use super::form::RegistrationPayload;

pub const REJECTION_FALLBACK: &str = "Registration failed";
pub const NETWORK_FAILURE: &str = "An error occurred during registration";

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The service answered with a non-success status.
    #[error("{}", .message.as_deref().unwrap_or(REJECTION_FALLBACK))]
    Rejected {
        status: u16,
        message: Option<String>,
    },

    /// The request never completed.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The service answered with something other than JSON.
    #[error("malformed response from account service: {0}")]
    Malformed(String),
}

impl Error {
    /// The single line shown above the form.
    pub fn root_message(&self) -> String {
        match self {
            Error::Rejected { message, .. } => message
                .clone()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| REJECTION_FALLBACK.to_string()),
            Error::Transport(_) | Error::Malformed(_) => NETWORK_FAILURE.to_string(),
        }
    }
}

/// Persists new accounts.
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn register(&self, payload: &RegistrationPayload) -> Result<()>;
}

#[async_trait]
impl<T: AccountService + ?Sized> AccountService for std::sync::Arc<T> {
    async fn register(&self, payload: &RegistrationPayload) -> Result<()> {
        (**self).register(payload).await
    }
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    message: Option<String>,
}

/// Posts registrations as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpAccountService {
    http: reqwest::Client,
    registration_url: String,
}

impl HttpAccountService {
    pub fn new(registration_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            registration_url: registration_url.into(),
        }
    }
}

#[async_trait]
impl AccountService for HttpAccountService {
    async fn register(&self, payload: &RegistrationPayload) -> Result<()> {
        debug!(
            "posting registration for {} to {}",
            payload.username, self.registration_url
        );

        let response = self
            .http
            .post(&self.registration_url)
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // Both outcomes are expected to carry a JSON body.
        let parsed = serde_json::from_str::<ServiceResponse>(&body)
            .map_err(|e| Error::Malformed(e.to_string()))?;

        if status.is_success() {
            return Ok(());
        }

        warn!(
            "account service rejected registration for {} ({status}): {:?}",
            payload.username, parsed.message
        );

        Err(Error::Rejected {
            status: status.as_u16(),
            message: parsed.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn payload() -> RegistrationPayload {
        RegistrationPayload {
            username: "john_doe7".into(),
            email: "john.doe@example.com".into(),
            password: "Aaaaaaa1".into(),
            main_game: "valorant".into(),
        }
    }

    #[tokio::test]
    async fn posts_the_payload_as_json() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/register").json_body(json!({
                    "username": "john_doe7",
                    "email": "john.doe@example.com",
                    "password": "Aaaaaaa1",
                    "mainGame": "valorant",
                }));
                then.status(201).json_body(json!({ "id": 1, "username": "john_doe7" }));
            })
            .await;

        let service = HttpAccountService::new(server.url("/api/register"));
        service.register(&payload()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_carries_the_service_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/register");
                then.status(409)
                    .json_body(json!({ "message": "Username already taken" }));
            })
            .await;

        let service = HttpAccountService::new(server.url("/api/register"));
        let error = service.register(&payload()).await.unwrap_err();

        assert!(matches!(error, Error::Rejected { status: 409, .. }));
        assert_eq!(error.root_message(), "Username already taken");
    }

    #[tokio::test]
    async fn rejection_without_message_uses_the_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/register");
                then.status(500).json_body(json!({}));
            })
            .await;

        let service = HttpAccountService::new(server.url("/api/register"));
        let error = service.register(&payload()).await.unwrap_err();

        assert_eq!(error.root_message(), REJECTION_FALLBACK);
    }

    #[tokio::test]
    async fn non_json_body_is_a_network_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/register");
                then.status(502).body("<html>Bad Gateway</html>");
            })
            .await;

        let service = HttpAccountService::new(server.url("/api/register"));
        let error = service.register(&payload()).await.unwrap_err();

        assert!(matches!(error, Error::Malformed(_)));
        assert_eq!(error.root_message(), NETWORK_FAILURE);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_failure() {
        // Nothing listens on port 9 on the loopback interface.
        let service = HttpAccountService::new("http://127.0.0.1:9/api/register");
        let error = service.register(&payload()).await.unwrap_err();

        assert!(matches!(error, Error::Transport(_)));
        assert_eq!(error.root_message(), NETWORK_FAILURE);
    }
}
