//! Dashboard backend operations keyed by module name.

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::client::ApiClient;
use super::error::ApiError;

/// Operations the dashboard needs from the backend service.
pub trait Backend: Send + Sync {
  /// Current dashboard state for a module.
  fn get_dashboard_state(&self, module: &str) -> BoxFuture<'static, Result<Value, ApiError>>;

  /// Run an AI analysis for a module. The reply is either text or JSON.
  fn analyze(&self, module: &str, prompt: &str) -> BoxFuture<'static, Result<Value, ApiError>>;

  /// Ask the backend to start a fresh scan for a module.
  fn trigger_scan(&self, module: &str) -> BoxFuture<'static, Result<Value, ApiError>>;
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
  prompt: &'a str,
}

/// [`Backend`] over the REST API.
#[derive(Clone)]
pub struct HttpBackend {
  client: ApiClient,
}

impl HttpBackend {
  pub fn new(client: ApiClient) -> Self {
    Self { client }
  }
}

impl Backend for HttpBackend {
  fn get_dashboard_state(&self, module: &str) -> BoxFuture<'static, Result<Value, ApiError>> {
    let client = self.client.clone();
    let endpoint = module_endpoint(module, "state");
    Box::pin(async move { client.get(&endpoint?).await })
  }

  fn analyze(&self, module: &str, prompt: &str) -> BoxFuture<'static, Result<Value, ApiError>> {
    let client = self.client.clone();
    let endpoint = module_endpoint(module, "analyze");
    let prompt = prompt.to_string();
    Box::pin(async move {
      let reply: Value = client
        .post(&endpoint?, &AnalyzeRequest { prompt: &prompt })
        .await?;
      Ok(unwrap_analysis(reply))
    })
  }

  fn trigger_scan(&self, module: &str) -> BoxFuture<'static, Result<Value, ApiError>> {
    let client = self.client.clone();
    let endpoint = module_endpoint(module, "scan");
    Box::pin(async move { client.post(&endpoint?, &serde_json::json!({})).await })
  }
}

/// `/modules/{module}/{action}` with the module name percent-encoded as a
/// single path segment.
fn module_endpoint(module: &str, action: &str) -> Result<String, ApiError> {
  let invalid = || ApiError::Transport(format!("Invalid module name: {}", module));
  let mut url = Url::parse("http://localhost/").map_err(|_| invalid())?;
  url
    .path_segments_mut()
    .map_err(|_| invalid())?
    .clear()
    .push("modules")
    .push(module)
    .push(action);
  Ok(url.path().to_string())
}

/// The analyze endpoint answers `{ "analysis": ... }`; older deployments
/// return the analysis directly.
fn unwrap_analysis(reply: Value) -> Value {
  match reply {
    Value::Object(mut map) if map.contains_key("analysis") => {
      map.remove("analysis").unwrap_or(Value::Null)
    }
    other => other,
  }
}
