//! Bearer-authenticated HTTP plumbing.
//!
//! Every request is gated on the session context first, so a missing
//! sign-in is rejected locally before anything reaches the wire. List
//! responses go through the tolerant normalizer; detail and mutation
//! responses are unwrapped from the backend's variable `data` nesting.
//! Idempotent GETs get a small bounded retry; creates and updates are
//! issued exactly once.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use hmc_core::error::{FieldViolation, ServiceError, ServiceResult};
use hmc_core::query::{ListPage, ListQuery};
use hmc_core::session::SessionContext;

use crate::config::ClientConfig;

/// Levels of `data` nesting to unwrap on detail/mutation responses.
const MAX_DETAIL_DEPTH: usize = 3;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    session: SessionContext,
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: SessionContext) -> ServiceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        Ok(Self {
            http,
            config,
            session,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Fetches one page of a list resource.
    pub async fn get_list(&self, path: &str, query: &ListQuery) -> ServiceResult<ListPage<Value>> {
        let token = self.session.require()?.token;
        let url = self.endpoint(path)?;
        let params = query.to_params();

        let response = self
            .send_get(|| self.http.get(url.clone()).bearer_auth(&token).query(&params))
            .await?;
        let body = Self::decode(response).await?;
        Ok(hmc_core::normalize(&body, query.limit))
    }

    /// Fetches one record by id; a 404 becomes [`ServiceError::NotFound`]
    /// so the caller can redirect to the list view.
    pub async fn get_detail(
        &self,
        entity: &'static str,
        path: &str,
        id: &str,
    ) -> ServiceResult<Value> {
        let token = self.session.require()?.token;
        let url = self.endpoint(&format!("{path}/{id}"))?;

        let response = self
            .send_get(|| self.http.get(url.clone()).bearer_auth(&token))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ServiceError::NotFound {
                entity,
                id: id.to_string(),
            });
        }
        Ok(detail(Self::decode(response).await?))
    }

    /// Issues a create. Never retried.
    pub async fn post(&self, path: &str, body: &impl Serialize) -> ServiceResult<Value> {
        let token = self.session.require()?.token;
        let url = self.endpoint(path)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        Ok(detail(Self::decode(response).await?))
    }

    /// Issues an update. Never retried.
    pub async fn put(&self, path: &str, body: &impl Serialize) -> ServiceResult<Value> {
        let token = self.session.require()?.token;
        let url = self.endpoint(path)?;
        let response = self
            .http
            .put(url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        Ok(detail(Self::decode(response).await?))
    }

    /// Soft-deletes a record.
    pub async fn delete(&self, path: &str, id: &str) -> ServiceResult<()> {
        let token = self.session.require()?.token;
        let url = self.endpoint(&format!("{path}/{id}"))?;
        let response = self
            .http
            .delete(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        Self::decode(response).await.map(|_| ())
    }

    /// Reverses a soft delete.
    pub async fn restore(&self, path: &str, id: &str) -> ServiceResult<()> {
        let token = self.session.require()?.token;
        let url = self.endpoint(&format!("{path}/{id}/restore"))?;
        let response = self
            .http
            .patch(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        Self::decode(response).await.map(|_| ())
    }

    fn endpoint(&self, path: &str) -> ServiceResult<Url> {
        let joined = format!(
            "{}/{}",
            self.config.base_url().as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|err| ServiceError::Network(format!("bad endpoint: {err}")))
    }

    /// Sends an idempotent GET, retrying transport failures and 5xx up to
    /// the configured budget with a short linear backoff.
    async fn send_get(&self, build: impl Fn() -> RequestBuilder) -> ServiceResult<Response> {
        let retries = self.config.get_retries();
        let mut attempt = 0u32;
        loop {
            match build().send().await {
                Ok(response) if response.status().is_server_error() && attempt < retries => {
                    tracing::warn!(status = %response.status(), attempt, "retrying GET after server error");
                }
                Ok(response) => return Ok(response),
                Err(err) if attempt < retries => {
                    tracing::warn!(attempt, "retrying GET after transport error: {err}");
                }
                Err(err) => return Err(ServiceError::Network(err.to_string())),
            }
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(u64::from(attempt) * 100)).await;
        }
    }

    async fn decode(response: Response) -> ServiceResult<Value> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ServiceError::Unauthenticated);
        }

        let body = response.json::<Value>().await;
        if status.is_success() {
            return body.map_err(|err| ServiceError::Decode(err.to_string()));
        }

        let body = body.unwrap_or(Value::Null);
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            violations: violations_from(&body),
        })
    }
}

/// Unwraps the backend's variable `data` nesting around a single record.
pub fn detail(mut value: Value) -> Value {
    for _ in 0..MAX_DETAIL_DEPTH {
        match value.get("data") {
            Some(inner) if inner.is_object() => value = inner.clone(),
            _ => break,
        }
    }
    value
}

/// Pulls the server-assigned id out of a create/update response.
pub fn extract_id(value: &Value) -> ServiceResult<String> {
    match value.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(ServiceError::Decode(
            "response carried no record id".into(),
        )),
    }
}

/// Extracts structured field violations from an error body. Known shapes:
/// `{errors: [{field|path, message}]}` and `{errors: {field: message}}`.
fn violations_from(body: &Value) -> Vec<FieldViolation> {
    let errors = body
        .get("errors")
        .or_else(|| body.get("data").and_then(|d| d.get("errors")));

    match errors {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let field = item
                    .get("field")
                    .or_else(|| item.get("path"))
                    .and_then(Value::as_str)?;
                let message = item.get("message").and_then(Value::as_str)?;
                Some(FieldViolation {
                    field: field.to_string(),
                    message: message.to_string(),
                })
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(field, message)| {
                Some(FieldViolation {
                    field: field.clone(),
                    message: message.as_str()?.to_string(),
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}
