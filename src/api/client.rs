use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::ApiError;
use crate::session::AuthProvider;

/// Per-call knobs for [`ApiClient::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  /// Extra headers; these override the defaults (including Content-Type)
  pub headers: HeaderMap,
  /// Overrides the client's default timeout
  pub timeout: Option<Duration>,
}

/// Authenticated JSON-over-HTTP client for the dashboard backend.
///
/// Holds no state besides the connection pool and cookie jar. The token is
/// read from the auth provider on every call so a login or logout takes
/// effect immediately.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: String,
  auth: Arc<dyn AuthProvider>,
  timeout: Duration,
}

impl ApiClient {
  pub fn new(
    base_url: &str,
    timeout: Duration,
    auth: Arc<dyn AuthProvider>,
  ) -> Result<Self, ApiError> {
    Url::parse(base_url)
      .map_err(|e| ApiError::Transport(format!("Invalid base URL {}: {}", base_url, e)))?;

    let http = reqwest::Client::builder()
      .cookie_store(true)
      .build()
      .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base_url: base_url.trim_end_matches('/').to_string(),
      auth,
      timeout,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  fn url(&self, endpoint: &str) -> String {
    format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
  }

  pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
    self
      .request::<T, ()>(Method::GET, endpoint, None, RequestOptions::default())
      .await
  }

  pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self
      .request(Method::POST, endpoint, Some(body), RequestOptions::default())
      .await
  }

  #[allow(dead_code)]
  pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    self
      .request(Method::PUT, endpoint, Some(body), RequestOptions::default())
      .await
  }

  #[allow(dead_code)]
  pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
    self
      .request::<T, ()>(Method::DELETE, endpoint, None, RequestOptions::default())
      .await
  }

  /// Perform one request and decode the JSON reply as `T`.
  ///
  /// `T` is trusted as the shape of the reply; nothing beyond deserialization
  /// is checked. Non-2xx replies become [`ApiError::Status`].
  pub async fn request<T, B>(
    &self,
    method: Method,
    endpoint: &str,
    body: Option<&B>,
    options: RequestOptions,
  ) -> Result<T, ApiError>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let url = self.url(endpoint);
    let timeout = options.timeout.unwrap_or(self.timeout);

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.extend(options.headers);

    let mut request = self.http.request(method.clone(), &url).headers(headers);
    if let Some(token) = self.auth.token() {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.body(serde_json::to_vec(body)?);
    }

    debug!(%method, %url, "Sending request");

    let exchange = async {
      let response = request.send().await?;
      let status = response.status();
      let bytes = response.bytes().await?;
      Ok::<_, reqwest::Error>((status, bytes))
    };

    let (status, bytes) = match tokio::time::timeout(timeout, exchange).await {
      Ok(Ok(reply)) => reply,
      Ok(Err(e)) if e.is_timeout() => return Err(ApiError::Timeout(timeout)),
      Ok(Err(e)) => return Err(e.into()),
      Err(_) => return Err(ApiError::Timeout(timeout)),
    };

    debug!(%method, %url, status = status.as_u16(), "Received response");

    if status.is_success() {
      if bytes.is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
      }
      return Ok(serde_json::from_slice(&bytes)?);
    }

    Err(status_error(status, &bytes))
  }
}

/// Build the typed error for a non-2xx reply.
///
/// Uses `{ "error": "..." }` from a JSON body when present, otherwise the
/// canonical status text.
fn status_error(status: StatusCode, bytes: &[u8]) -> ApiError {
  let status_text = status
    .canonical_reason()
    .map(String::from)
    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

  let (message, body) = match serde_json::from_slice::<Value>(bytes) {
    Ok(body) => {
      let message = body
        .get("error")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| status_text.clone());
      (message, body)
    }
    Err(_) => (status_text.clone(), json!({ "error": status_text })),
  };

  ApiError::Status {
    status: status.as_u16(),
    message,
    body,
  }
}
