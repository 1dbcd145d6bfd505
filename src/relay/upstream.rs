//! Upstream workflow API client.
//!
//! # Responsibilities
//! - Build the workflow request body from a validated note
//! - POST it with bearer authorization, exactly once
//! - Map non-success statuses to [`RelayError::Upstream`]
//! - Extract `data.outputs` from blocking responses

use hyper::ext::ReasonPhrase;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{ConfigError, UpstreamConfig};
use crate::http::request::ValidNote;
use crate::relay::classify::ResponseMode;
use crate::relay::error::{RelayError, RelayResult};

/// Workflow input variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowInputs {
    pub user_emotion_input: String,
    pub user_event_description: String,
    pub user_behavior_input: String,
}

/// Body of a workflow run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowRequest {
    pub inputs: WorkflowInputs,
    pub response_mode: ResponseMode,
    pub user: String,
}

impl WorkflowRequest {
    /// Anonymous notes get `<fallback_prefix><millis>` as user.
    pub fn new(note: ValidNote, response_mode: ResponseMode, fallback_prefix: &str) -> Self {
        let user = note
            .user_name
            .unwrap_or_else(|| fallback_user(fallback_prefix));

        Self {
            inputs: WorkflowInputs {
                user_emotion_input: note.emotion,
                user_event_description: note.event,
                user_behavior_input: note.behavior,
            },
            response_mode,
            user,
        }
    }
}

static LAST_FALLBACK_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Generate an upstream user id from the wall clock.
///
/// The value is strictly increasing within the process, so two anonymous
/// requests landing in the same millisecond still get distinct ids.
pub fn fallback_user(prefix: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    let mut prev = LAST_FALLBACK_MILLIS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_FALLBACK_MILLIS.compare_exchange_weak(
            prev,
            next,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return format!("{}{}", prefix, next),
            Err(actual) => prev = actual,
        }
    }
}

/// Client for the workflow run endpoint.
#[derive(Clone)]
pub struct WorkflowClient {
    http: reqwest::Client,
    url: String,
    auth: HeaderValue,
    fallback_prefix: String,
}

impl WorkflowClient {
    /// Build a client from configuration.
    ///
    /// Fails with [`ConfigError::MissingApiKey`] when no key is configured,
    /// [`ConfigError::InvalidApiKey`] when it cannot be sent as a header and
    /// [`ConfigError::HttpClient`] when the client cannot be built.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        let env_var = || config.api_key_env.clone();

        let key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey { env_var: env_var() })?;

        // The key itself stays out of the error.
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| ConfigError::InvalidApiKey { env_var: env_var() })?;
        auth.set_sensitive(true);

        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            url: config.url.clone(),
            auth,
            fallback_prefix: config.fallback_user_prefix.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fallback_prefix(&self) -> &str {
        &self.fallback_prefix
    }

    /// POST a workflow run. Returns the response once its head is received.
    pub async fn run(&self, request: &WorkflowRequest) -> RelayResult<reqwest::Response> {
        let response = self
            .http
            .post(&self.url)
            .header(AUTHORIZATION, self.auth.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = upstream_reason(&response);
            tracing::error!(
                status = status.as_u16(),
                reason = reason.as_deref().or(status.canonical_reason()).unwrap_or(""),
                "Dify API error"
            );
            return Err(RelayError::Upstream { status, reason });
        }

        Ok(response)
    }
}

/// Read a blocking-mode response and pull out `data.outputs`.
pub async fn blocking_outputs(response: reqwest::Response) -> RelayResult<Value> {
    let body: Value = response.json().await?;
    extract_outputs(body)
}

/// Reason phrase upstream sent, when it is not the canonical one.
///
/// The HTTP/1 client keeps only non-canonical phrases, as a response extension.
fn upstream_reason(response: &reqwest::Response) -> Option<String> {
    response
        .extensions()
        .get::<ReasonPhrase>()
        .map(|phrase| String::from_utf8_lossy(phrase.as_bytes()).into_owned())
}

/// `data.outputs` if present and truthy, else [`RelayError::UnexpectedUpstreamFormat`].
pub fn extract_outputs(mut body: Value) -> RelayResult<Value> {
    let outputs = body
        .get_mut("data")
        .and_then(|data| data.get_mut("outputs"))
        .map(Value::take);

    match outputs {
        Some(outputs) if is_truthy(&outputs) => Ok(outputs),
        _ => {
            tracing::error!(body = %body, "Unexpected response format");
            Err(RelayError::UnexpectedUpstreamFormat)
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note(user_name: Option<&str>) -> ValidNote {
        ValidNote {
            emotion: "anxious".into(),
            event: "exam tomorrow".into(),
            behavior: "couldn't sleep".into(),
            user_name: user_name.map(String::from),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let request = WorkflowRequest::new(note(Some("mei")), ResponseMode::Streaming, "anon-");
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "inputs": {
                    "user_emotion_input": "anxious",
                    "user_event_description": "exam tomorrow",
                    "user_behavior_input": "couldn't sleep"
                },
                "response_mode": "streaming",
                "user": "mei"
            })
        );
    }

    #[test]
    fn test_anonymous_user_gets_fallback() {
        let a = WorkflowRequest::new(note(None), ResponseMode::Blocking, "quantum-user-");
        let b = WorkflowRequest::new(note(None), ResponseMode::Blocking, "quantum-user-");
        assert!(a.user.starts_with("quantum-user-"));
        assert!(a.user.len() > "quantum-user-".len());
        assert_ne!(a.user, b.user);
    }

    #[test]
    fn test_fallback_user_is_strictly_increasing() {
        let ids: Vec<u64> = (0..100)
            .map(|_| fallback_user("p").trim_start_matches('p').parse().unwrap())
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_extract_outputs() {
        let body = json!({ "data": { "outputs": { "result": "ok" } } });
        assert_eq!(extract_outputs(body).unwrap(), json!({ "result": "ok" }));
    }

    #[test]
    fn test_extract_outputs_rejects_malformed() {
        for body in [
            json!({ "foo": 1 }),
            json!({ "data": {} }),
            json!({ "data": { "outputs": null } }),
            json!({ "data": { "outputs": "" } }),
            json!({ "data": "outputs" }),
        ] {
            assert!(matches!(
                extract_outputs(body),
                Err(RelayError::UnexpectedUpstreamFormat)
            ));
        }
    }

    #[test]
    fn test_missing_api_key_is_construction_error() {
        let config = UpstreamConfig::default();
        let err = WorkflowClient::from_config(&config).err().unwrap();
        assert!(matches!(err, ConfigError::MissingApiKey { ref env_var } if env_var == "DIFY_API_KEY"));

        let config = UpstreamConfig {
            api_key: Some("   ".into()),
            ..Default::default()
        };
        assert!(WorkflowClient::from_config(&config).is_err());
    }

    #[test]
    fn test_unsendable_api_key_is_distinct_error() {
        let config = UpstreamConfig {
            api_key: Some("app-\nsecret".into()),
            ..Default::default()
        };
        let err = WorkflowClient::from_config(&config).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidApiKey { ref env_var } if env_var == "DIFY_API_KEY"));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn test_client_from_config() {
        let config = UpstreamConfig {
            api_key: Some("app-key".into()),
            url: "http://127.0.0.1:1/run".into(),
            ..Default::default()
        };
        let client = WorkflowClient::from_config(&config).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:1/run");
        assert_eq!(client.fallback_prefix(), "quantum-user-");
    }
}
