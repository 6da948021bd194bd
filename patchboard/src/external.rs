//! External HTTP side effects for `action_type: api`.
//!
//! The executor is the only place the runtime touches the network. Its
//! failure path never reaches patch-engine control flow: success and
//! failure alike are written into `state.runtime.*` through the normal
//! apply/deliver pipeline, and the task completes.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::ApiCallError;
use crate::path;
use crate::patch::SchemaPatch;
use crate::runtime::SharedRuntime;
use crate::schema::ApiActionConfig;
use crate::template;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Pluggable transport for api actions; tests substitute a stub.
#[async_trait]
pub trait ApiExecutor: Send + Sync {
    async fn execute(
        &self,
        cfg: &ApiActionConfig,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiCallError>;
}

/// The real transport.
pub struct HttpApiExecutor {
    client: reqwest::Client,
}

impl HttpApiExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpApiExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiExecutor for HttpApiExecutor {
    async fn execute(
        &self,
        cfg: &ApiActionConfig,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiCallError> {
        let timeout_secs = cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let method: reqwest::Method = cfg
            .method
            .to_uppercase()
            .parse()
            .unwrap_or(reqwest::Method::POST);

        let mut request = self
            .client
            .request(method, url)
            .timeout(std::time::Duration::from_secs(timeout_secs));
        if let Some(headers) = &cfg.headers {
            for (k, v) in headers {
                if let Some(s) = v.as_str() {
                    request = request.header(k, s);
                }
            }
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiCallError::Timeout {
                    url: url.to_string(),
                    timeout_secs,
                }
            } else {
                ApiCallError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiCallError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ApiCallError::Transport {
                url: url.to_string(),
                reason: format!("invalid JSON body: {e}"),
            })
    }
}

/// Run one api action end to end: expand, call, map the outcome into
/// `state.runtime.*`. Spawned by the event pipeline's caller after the
/// runtime lock has been released.
pub async fn run_api_action(
    runtime: SharedRuntime,
    executor: std::sync::Arc<dyn ApiExecutor>,
    instance: String,
    cfg: ApiActionConfig,
) {
    let snapshot = {
        let rt = runtime.read().await;
        match rt.schema(&instance) {
            Ok(s) => s.to_doc(),
            Err(e) => {
                warn!(%instance, error = %e, "api action against unknown instance");
                return;
            }
        }
    };

    let url = match template::expand_str(&snapshot, &cfg.url) {
        Value::String(s) => s,
        other => other.to_string(),
    };
    let body = cfg
        .body
        .as_ref()
        .map(|b| template::expand_value(&snapshot, b));

    let patches = match executor.execute(&cfg, &url, body.as_ref()).await {
        Ok(response) => success_patches(&cfg, &response),
        Err(e) => {
            warn!(%instance, url = %url, error = %e, "api action failed");
            failure_patches(&cfg, &e)
        }
    };

    let mut rt = runtime.write().await;
    if let Err(e) = rt.apply_and_deliver(&instance, &patches) {
        warn!(%instance, error = %e, "could not record api action outcome");
    }
}

fn success_patches(cfg: &ApiActionConfig, response: &Value) -> Vec<SchemaPatch> {
    match &cfg.response_mapping {
        Some(mapping) => mapping
            .iter()
            .map(|(runtime_key, response_path)| {
                let value = match response_path.as_str() {
                    Some(p) => path::get_or(response, p, Value::Null),
                    None => response_path.clone(),
                };
                SchemaPatch::set(format!("state.runtime.{runtime_key}"), value)
            })
            .collect(),
        None => vec![
            SchemaPatch::set("state.runtime.api_response", response.clone()),
            SchemaPatch::set("state.runtime.status", Value::String("ok".into())),
        ],
    }
}

fn failure_patches(cfg: &ApiActionConfig, error: &ApiCallError) -> Vec<SchemaPatch> {
    match &cfg.error_mapping {
        Some(mapping) => mapping
            .iter()
            .map(|(runtime_key, literal)| {
                SchemaPatch::set(format!("state.runtime.{runtime_key}"), literal.clone())
            })
            .collect(),
        None => vec![
            SchemaPatch::set("state.runtime.error", Value::String(error.to_string())),
            SchemaPatch::set("state.runtime.status", Value::String("error".into())),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{shared, Runtime};
    use crate::schema::UiSchema;
    use serde_json::json;
    use std::sync::Arc;

    struct StubExecutor {
        result: Result<Value, ApiCallError>,
    }

    #[async_trait]
    impl ApiExecutor for StubExecutor {
        async fn execute(
            &self,
            _cfg: &ApiActionConfig,
            _url: &str,
            _body: Option<&Value>,
        ) -> Result<Value, ApiCallError> {
            match &self.result {
                Ok(v) => Ok(v.clone()),
                Err(ApiCallError::Status { url, status }) => Err(ApiCallError::Status {
                    url: url.clone(),
                    status: *status,
                }),
                Err(ApiCallError::Timeout { url, timeout_secs }) => Err(ApiCallError::Timeout {
                    url: url.clone(),
                    timeout_secs: *timeout_secs,
                }),
                Err(ApiCallError::Transport { url, reason }) => Err(ApiCallError::Transport {
                    url: url.clone(),
                    reason: reason.clone(),
                }),
            }
        }
    }

    fn test_runtime() -> SharedRuntime {
        let mut rt = Runtime::new("page");
        rt.store.set("page", UiSchema::new("page"));
        shared(rt)
    }

    fn cfg() -> ApiActionConfig {
        serde_json::from_value(json!({
            "url": "https://example.test/users",
            "response_mapping": {"user_count": "count"},
            "error_mapping": {"error": "load failed", "status": "error"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn success_writes_response_mapping() {
        let rt = test_runtime();
        let exec = Arc::new(StubExecutor {
            result: Ok(json!({"count": 42, "ignored": true})),
        });
        run_api_action(rt.clone(), exec, "page".into(), cfg()).await;

        let guard = rt.read().await;
        let schema = guard.schema("page").unwrap();
        assert_eq!(schema.state.runtime["user_count"], json!(42));
        assert_eq!(guard.history.count("page"), 1);
    }

    #[tokio::test]
    async fn failure_writes_error_mapping() {
        let rt = test_runtime();
        let exec = Arc::new(StubExecutor {
            result: Err(ApiCallError::Status {
                url: "https://example.test/users".into(),
                status: 503,
            }),
        });
        run_api_action(rt.clone(), exec, "page".into(), cfg()).await;

        let guard = rt.read().await;
        let schema = guard.schema("page").unwrap();
        assert_eq!(schema.state.runtime["error"], json!("load failed"));
        assert_eq!(schema.state.runtime["status"], json!("error"));
    }

    #[tokio::test]
    async fn failure_without_mapping_uses_default_keys() {
        let rt = test_runtime();
        let exec = Arc::new(StubExecutor {
            result: Err(ApiCallError::Timeout {
                url: "https://example.test/slow".into(),
                timeout_secs: 30,
            }),
        });
        let mut bare = cfg();
        bare.error_mapping = None;
        run_api_action(rt.clone(), exec, "page".into(), bare).await;

        let guard = rt.read().await;
        let schema = guard.schema("page").unwrap();
        assert_eq!(schema.state.runtime["status"], json!("error"));
        assert!(schema.state.runtime["error"]
            .as_str()
            .unwrap()
            .contains("timed out"));
    }
}
