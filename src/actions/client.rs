//! Ways a rendered card hands its payload to a dispatcher.

use std::fmt;

use serde::Deserialize;
use tracing::debug;

use super::dispatcher::ActionDispatcher;
use super::payload::{ActionPayload, ActionResult};
use crate::utils::url::construct_api_url;

/// Path of the action endpoint relative to the server root.
pub const CARD_ACTION_PATH: &str = "api/card-action";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The dispatcher refused the payload (4xx).
    Rejected { status: u16, message: String },
    /// The dispatcher failed unexpectedly (5xx).
    Server { status: u16, message: String },
    /// The endpoint could not be reached.
    Transport(String),
    /// The endpoint answered with something that is not an action result.
    Decode(String),
}

impl SubmitError {
    /// Text shown inline under the card.
    pub fn inline_message(&self) -> String {
        match self {
            SubmitError::Rejected { message, .. } | SubmitError::Server { message, .. } => {
                format!("Error: {message}")
            }
            SubmitError::Transport(_) | SubmitError::Decode(_) => {
                "Error: Failed to send action to server.".to_string()
            }
        }
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Rejected { status, message } => {
                write!(f, "action rejected ({status}): {message}")
            }
            SubmitError::Server { status, message } => {
                write!(f, "action failed ({status}): {message}")
            }
            SubmitError::Transport(detail) => write!(f, "action endpoint unreachable: {detail}"),
            SubmitError::Decode(detail) => write!(f, "unreadable action response: {detail}"),
        }
    }
}

impl std::error::Error for SubmitError {}

#[async_trait::async_trait]
pub trait ActionSubmitter: Send + Sync {
    async fn submit(&self, payload: &ActionPayload) -> Result<ActionResult, SubmitError>;
}

/// Dispatches in-process, no network round-trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalActionClient {
    dispatcher: ActionDispatcher,
}

#[async_trait::async_trait]
impl ActionSubmitter for LocalActionClient {
    async fn submit(&self, payload: &ActionPayload) -> Result<ActionResult, SubmitError> {
        self.dispatcher
            .dispatch(payload)
            .map_err(|err| SubmitError::Rejected {
                status: err.status_code(),
                message: err.to_string(),
            })
    }
}

/// Posts payloads to a remote `/api/card-action` endpoint.
#[derive(Debug, Clone)]
pub struct HttpActionClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpActionClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: construct_api_url(base_url, CARD_ACTION_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl ActionSubmitter for HttpActionClient {
    async fn submit(&self, payload: &ActionPayload) -> Result<ActionResult, SubmitError> {
        debug!(endpoint = %self.endpoint, action = ?payload.action(), "posting card action");
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|err| SubmitError::Decode(err.to_string()));
        }

        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| "Failed to process action".to_string());
        if status.is_client_error() {
            Err(SubmitError::Rejected {
                status: status.as_u16(),
                message,
            })
        } else {
            Err(SubmitError::Server {
                status: status.as_u16(),
                message,
            })
        }
    }
}
