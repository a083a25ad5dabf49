//! Shared HTTP plumbing for the workspace and SQL endpoint clients.
//!
//! Both remote systems live behind the same workspace host and accept the
//! same bearer credentials, so a single `ApiClient` serves both. Each call
//! names the `ErrorKind` its failures should surface as.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{PortalError, Result};

/// Supplies the `Authorization` header value for each request.
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    /// Returns the full header value, e.g. `Bearer <token>`.
    fn authorization(&self) -> Result<String>;
}

/// Personal access token credentials.
#[derive(Clone)]
pub struct TokenCredentials {
    token: String,
}

impl TokenCredentials {
    /// Creates credentials from a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CredentialsProvider for TokenCredentials {
    fn authorization(&self) -> Result<String> {
        if self.token.is_empty() {
            return Err(PortalError::connection("Access token is empty"));
        }
        Ok(format!("Bearer {}", self.token))
    }
}

/// Which error variant a failed call surfaces as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Query,
    Job,
    Output,
    TableRead,
}

impl ErrorKind {
    /// Wraps a message in the matching `PortalError` variant.
    pub fn error(self, msg: impl Into<String>) -> PortalError {
        match self {
            Self::Connection => PortalError::connection(msg),
            Self::Query => PortalError::query(msg),
            Self::Job => PortalError::job(msg),
            Self::Output => PortalError::output(msg),
            Self::TableRead => PortalError::table_read(msg),
        }
    }
}

/// Error body returned by workspace REST endpoints.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Authenticated JSON client rooted at the workspace URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    credentials: Arc<dyn CredentialsProvider>,
    client: Client,
}

impl ApiClient {
    /// Creates a client for the given workspace URL.
    pub fn new(
        base_url: Url,
        credentials: Arc<dyn CredentialsProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortalError::connection(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: with_trailing_slash(base_url),
            credentials,
            client,
        })
    }

    /// Returns the workspace URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an API path against the workspace URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| PortalError::internal(format!("Invalid API path '{path}': {e}")))
    }

    /// Sends a GET request and decodes the JSON response.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        kind: ErrorKind,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let request = self.client.get(url).query(query);
        self.send(request, kind).await
    }

    /// Sends a POST request with a JSON body and decodes the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B, kind: ErrorKind) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let request = self.client.post(url).json(body);
        self.send(request, kind).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, kind: ErrorKind) -> Result<T> {
        let authorization = self.credentials.authorization()?;

        let response = request
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    kind.error("Request timed out. Try again.")
                } else if e.is_connect() {
                    kind.error(format!(
                        "Failed to connect to {}. Check your network.",
                        self.base_url
                    ))
                } else {
                    kind.error(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| kind.error(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(parse_error(status, &body, kind));
        }

        let body = if body.trim().is_empty() { "{}" } else { body.as_str() };
        serde_json::from_str(body)
            .map_err(|e| kind.error(format!("Failed to parse response: {e}")))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Converts a non-success response into an error of the caller's kind.
pub(crate) fn parse_error(status: StatusCode, body: &str, kind: ErrorKind) -> PortalError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return kind.error(format!(
            "Authentication failed ({status}). Check your DATABRICKS_TOKEN."
        ));
    }

    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = parsed.message {
            return match parsed.error_code {
                Some(code) => kind.error(format!("{code}: {message}")),
                None => kind.error(message),
            };
        }
    }

    kind.error(format!("API error ({status}): {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(
            Url::parse(base).unwrap(),
            Arc::new(TokenCredentials::new("dapi-test")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_token_credentials_header() {
        let creds = TokenCredentials::new("abc");
        assert_eq!(creds.authorization().unwrap(), "Bearer abc");
    }

    #[test]
    fn test_empty_token_is_connection_error() {
        let err = TokenCredentials::new("").authorization().unwrap_err();
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let debug = format!("{:?}", TokenCredentials::new("secret-token"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_endpoint_joins_under_host() {
        let api = client("https://adb-1.azuredatabricks.net");
        assert_eq!(
            api.endpoint("/api/2.1/jobs/runs/submit").unwrap().as_str(),
            "https://adb-1.azuredatabricks.net/api/2.1/jobs/runs/submit"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_prefix() {
        let api = client("http://localhost:9000/proxy");
        assert_eq!(
            api.endpoint("api/2.0/clean-rooms").unwrap().as_str(),
            "http://localhost:9000/proxy/api/2.0/clean-rooms"
        );
    }

    #[test]
    fn test_parse_error_unauthorized() {
        let err = parse_error(StatusCode::UNAUTHORIZED, "", ErrorKind::Connection);
        assert_eq!(err.category(), "Connection Error");
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_parse_error_uses_api_message() {
        let body = r#"{"error_code":"INVALID_PARAMETER_VALUE","message":"Run 12 does not exist"}"#;
        let err = parse_error(StatusCode::BAD_REQUEST, body, ErrorKind::Output);
        assert_eq!(
            err.to_string(),
            "Output resolution error: INVALID_PARAMETER_VALUE: Run 12 does not exist"
        );
    }

    #[test]
    fn test_parse_error_falls_back_to_body() {
        let err = parse_error(StatusCode::BAD_GATEWAY, "upstream down", ErrorKind::Job);
        assert_eq!(err.category(), "Job Submission Error");
        assert!(err.to_string().contains("upstream down"));
    }
}
