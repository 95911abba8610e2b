//! Agent service HTTP client.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::agent::DubbingAgent;
use crate::error::{AgentError, AgentResult};
use crate::types::{DubJobRequest, DubRequest, DubResponse, HealthResponse, SessionRequest, SessionResponse};

/// Configuration for the agent client.
#[derive(Clone)]
pub struct AgentConfig {
    /// Base URL of the agent service
    pub base_url: String,
    /// Login email for the dubbing website
    pub email: Option<String>,
    /// Login password for the dubbing website
    pub password: Option<String>,
    /// Run the agent's browser without a window
    pub headless: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            email: None,
            password: None,
            headless: true,
            timeout: Duration::from_secs(600), // one dubbing run can take minutes
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("headless", &self.headless)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AgentConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            base_url: std::env::var("AGENT_URL")
                .unwrap_or_else(|_| "http://localhost:8100".to_string())
                .trim_end_matches('/')
                .to_string(),
            email: non_empty("AGENT_EMAIL"),
            password: non_empty("AGENT_PASSWORD"),
            headless: std::env::var("BROWSER_HEADLESS")
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
            timeout: Duration::from_secs(
                std::env::var("BROWSER_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }

    fn credentials(&self) -> AgentResult<(String, String)> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Ok((email.clone(), password.clone())),
            _ => Err(AgentError::MissingCredentials),
        }
    }
}

/// [`DubbingAgent`] over the agent service's HTTP API.
pub struct HttpAgentClient {
    http: Client,
    config: AgentConfig,
    session: RwLock<Option<String>>,
}

impl HttpAgentClient {
    /// Create a new agent client.
    pub fn new(config: AgentConfig) -> AgentResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AgentError::Network)?;

        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> AgentResult<Self> {
        Self::new(AgentConfig::from_env())
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Check if the agent service is healthy.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.json::<HealthResponse>().await {
                Ok(health) => health.status == "healthy" || health.status == "ok",
                Err(e) => {
                    warn!("Agent health response unreadable: {}", e);
                    false
                }
            },
            Ok(response) => {
                warn!("Agent health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Agent health check error: {}", e);
                false
            }
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> AgentError {
        if e.is_timeout() {
            AgentError::Timeout(self.config.timeout.as_secs())
        } else if e.is_connect() {
            AgentError::ServiceUnavailable(e.to_string())
        } else {
            AgentError::Network(e)
        }
    }

    async fn error_body(response: Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        format!("agent returned {}: {}", status, body.trim())
    }
}

#[async_trait]
impl DubbingAgent for HttpAgentClient {
    async fn authenticate(&self) -> AgentResult<()> {
        if self.session.read().await.is_some() {
            return Ok(());
        }

        let (email, password) = self.config.credentials()?;
        let url = format!("{}/session", self.config.base_url);
        info!("Logging in to dubbing agent at {}", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .json(&SessionRequest {
                email,
                password,
                headless: self.config.headless,
            })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AgentError::LoginRejected(Self::error_body(response).await))
            }
            s if s.is_server_error() => {
                return Err(AgentError::ServiceUnavailable(Self::error_body(response).await))
            }
            _ => return Err(AgentError::InvalidResponse(Self::error_body(response).await)),
        }

        let session: SessionResponse = response.json().await?;
        if session.session_id.is_empty() {
            return Err(AgentError::InvalidResponse("empty session id".to_string()));
        }

        *self.session.write().await = Some(session.session_id);
        info!("Agent login successful");
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn dub(&self, request: &DubRequest) -> AgentResult<PathBuf> {
        let session_id = self
            .session
            .read()
            .await
            .clone()
            .ok_or(AgentError::NotAuthenticated)?;

        let url = format!("{}/dub", self.config.base_url);
        debug!(
            "Dubbing segment {} ({} -> {})",
            request.segment_index,
            request.input.display(),
            request.output.display()
        );

        let body = DubJobRequest {
            session_id,
            input_path: request.input.to_string_lossy().to_string(),
            output_path: request.output.to_string_lossy().to_string(),
            target_language: request.target_language.clone(),
            headless: self.config.headless,
            timeout_secs: self.config.timeout.as_secs(),
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED => {
                // The agent dropped our session; log in again on the next job.
                *self.session.write().await = None;
                return Err(AgentError::NotAuthenticated);
            }
            s if s.is_server_error() => {
                return Err(AgentError::ServiceUnavailable(Self::error_body(response).await))
            }
            _ => return Err(AgentError::DubbingFailed(Self::error_body(response).await)),
        }

        let dubbed: DubResponse = response.json().await?;
        if !dubbed.is_completed() {
            return Err(AgentError::DubbingFailed(
                dubbed.error.unwrap_or_else(|| format!("agent reported status '{}'", dubbed.status)),
            ));
        }

        Ok(dubbed
            .output_path
            .map(PathBuf::from)
            .unwrap_or_else(|| request.output.clone()))
    }

    async fn invalidate(&self) {
        *self.session.write().await = None;
    }
}
