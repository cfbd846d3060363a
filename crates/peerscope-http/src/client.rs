//! JSON HTTP client with status classification and bounded retries.

use std::time::Duration;

use peerscope_core::ExternalError;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde_json::Value;

use crate::policy::RetryPolicy;
use crate::retry::call_with_retry;

/// Characters of a response body kept in errors and logs.
const SNIPPET_CHARS: usize = 500;

/// First `max_chars` characters of `text`, on a char boundary.
#[must_use]
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// How requests authenticate.
#[derive(Clone)]
pub enum AuthHeader {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// A named header carrying the key, e.g. `X-API-Key`.
    ApiKey { header: String, value: String },
    None,
}

impl std::fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthHeader::Bearer(_) => f.write_str("Bearer([redacted])"),
            AuthHeader::ApiKey { header, .. } => write!(f, "ApiKey({header}: [redacted])"),
            AuthHeader::None => f.write_str("None"),
        }
    }
}

/// Resilient caller for one external JSON API.
///
/// Use [`ExternalCallClient::new`] with the production base URL, or point it
/// at a mock server in tests.
#[derive(Debug, Clone)]
pub struct ExternalCallClient {
    client: Client,
    target: String,
    base_url: Url,
    auth: AuthHeader,
    policy: RetryPolicy,
}

impl ExternalCallClient {
    /// Builds a client for `target` rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ExternalError::Validation`] if `base_url` does not parse, or
    /// [`ExternalError::Network`] if the HTTP client cannot be constructed.
    pub fn new(
        target: &str,
        base_url: &str,
        auth: AuthHeader,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, ExternalError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("peerscope/0.1 (growth-analysis)")
            .build()
            .map_err(|e| ExternalError::Network {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        // Exactly one trailing slash so relative joins append to the path.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| {
            ExternalError::Validation(format!("invalid base URL '{base_url}': {e}"))
        })?;

        Ok(Self {
            client,
            target: target.to_string(),
            base_url,
            auth,
            policy,
        })
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// `GET path?query`, returning the parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`ExternalError`] after retries are exhausted.
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ExternalError> {
        let url = self.endpoint(path)?;
        self.execute(path, || self.client.get(url.clone()).query(query))
            .await
    }

    /// `POST path` with a JSON body, returning the parsed JSON response.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`ExternalError`] after retries are exhausted.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, ExternalError> {
        let url = self.endpoint(path)?;
        self.execute(path, || self.client.post(url.clone()).json(body))
            .await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ExternalError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ExternalError::Validation(format!("invalid path '{path}': {e}")))
    }

    async fn execute<F>(&self, path: &str, build: F) -> Result<Value, ExternalError>
    where
        F: Fn() -> RequestBuilder,
    {
        let value = call_with_retry(&self.target, &self.policy, || {
            self.send_once(path, self.authorize(build()))
        })
        .await?;

        if let Some(pause) = self.policy.courtesy_delay {
            tokio::time::sleep(pause).await;
        }
        Ok(value)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthHeader::Bearer(token) => request.bearer_auth(token),
            AuthHeader::ApiKey { header, value } => request.header(header.as_str(), value),
            AuthHeader::None => request,
        }
    }

    /// One attempt: send, classify the status, parse the body.
    async fn send_once(&self, path: &str, request: RequestBuilder) -> Result<Value, ExternalError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.status_error(path, status, response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(&e))?;
        serde_json::from_str(&body).map_err(|e| ExternalError::MalformedResponse {
            snippet: truncate_for_log(&body, SNIPPET_CHARS),
            reason: format!("{} response body is not JSON: {e}", self.target),
        })
    }

    async fn status_error(
        &self,
        path: &str,
        status: StatusCode,
        response: reqwest::Response,
    ) -> ExternalError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ExternalError::RateLimited {
                target: self.target.clone(),
                attempts: 1,
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::error!(
                    service = %self.target,
                    status = status.as_u16(),
                    "credentials rejected; check the configured API key"
                );
                ExternalError::Auth {
                    target: self.target.clone(),
                    status: status.as_u16(),
                }
            }
            StatusCode::NOT_FOUND => ExternalError::NotFound {
                target: self.target.clone(),
                resource: path.to_string(),
            },
            _ => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    service = %self.target,
                    status = status.as_u16(),
                    path,
                    body = %truncate_for_log(&body, SNIPPET_CHARS),
                    "unexpected HTTP status"
                );
                ExternalError::Server {
                    target: self.target.clone(),
                    status: status.as_u16(),
                }
            }
        }
    }

    fn transport_error(&self, err: &reqwest::Error) -> ExternalError {
        if err.is_timeout() {
            ExternalError::Timeout {
                target: self.target.clone(),
                attempts: 1,
            }
        } else {
            ExternalError::Network {
                target: self.target.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> ExternalCallClient {
        ExternalCallClient::new(
            "test",
            base_url,
            AuthHeader::None,
            Duration::from_secs(5),
            RetryPolicy::immediate(0),
        )
        .expect("client construction should not fail")
    }

    #[test]
    fn endpoint_appends_to_base_path() {
        let client = test_client("https://api.x.ai/v1");
        let url = client.endpoint("/chat/completions").unwrap();
        assert_eq!(url.as_str(), "https://api.x.ai/v1/chat/completions");
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = test_client("https://api.twitterapi.io/");
        let url = client.endpoint("twitter/user/info").unwrap();
        assert_eq!(url.as_str(), "https://api.twitterapi.io/twitter/user/info");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = ExternalCallClient::new(
            "test",
            "not a url",
            AuthHeader::None,
            Duration::from_secs(1),
            RetryPolicy::default(),
        );
        assert!(matches!(result, Err(ExternalError::Validation(_))));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_for_log("héllo", 2), "hé");
        assert_eq!(truncate_for_log("abc", 10), "abc");
    }

    #[test]
    fn auth_debug_is_redacted() {
        let auth = AuthHeader::ApiKey {
            header: "X-API-Key".to_string(),
            value: "secret".to_string(),
        };
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("X-API-Key"));
    }
}
