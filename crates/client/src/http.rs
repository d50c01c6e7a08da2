//! Authenticated HTTP client.
//!
//! Every request carries the current access token as a bearer header. A 401
//! triggers exactly one refresh-token call and one retry of the original
//! request; whatever the retry returns is final. A failed refresh clears the
//! stored credential and surfaces as [`ClientError::RefreshFailed`].
//!
//! Refreshes are serialized. A caller whose rejected token was already
//! replaced by a concurrent refresh retries with the stored token instead of
//! spending the (possibly rotated) refresh token a second time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::{Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use console_auth::{AuthResponse, RefreshRequest};
use console_core::ApiEnvelope;

use crate::config::ClientConfig;
use crate::endpoints::Endpoints;
use crate::error::ClientError;
use crate::token_store::TokenStore;

pub use reqwest::Method;

/// Body of an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// Multipart form that can be rebuilt for the retry after a refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<(String, FormPart)>,
}

#[derive(Debug, Clone, PartialEq)]
enum FormPart {
    Text(String),
    File {
        file_name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parts.push((name.into(), FormPart::Text(value.into())));
    }

    pub fn add_file(
        &mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) {
        self.parts.push((
            name.into(),
            FormPart::File {
                file_name: file_name.into(),
                mime_type,
                bytes,
            },
        ));
    }

    /// Text value of the first part named `name`.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|(n, part)| match part {
            FormPart::Text(value) if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.parts.iter().any(|(n, _)| n == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    fn to_reqwest(&self) -> Result<reqwest::multipart::Form, ClientError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, part) in &self.parts {
            form = match part {
                FormPart::Text(value) => form.text(name.clone(), value.clone()),
                FormPart::File {
                    file_name,
                    mime_type,
                    bytes,
                } => {
                    let mut file = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime_type {
                        file = file
                            .mime_str(mime)
                            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    tokens: Arc<TokenStore>,
    refresh_gate: Arc<Mutex<()>>,
    // Bumped every time a failed refresh signs the user out.
    sign_outs: Arc<AtomicU64>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig, tokens: Arc<TokenStore>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoints: Endpoints::new(config.api_url.clone()),
            tokens,
            refresh_gate: Arc::new(Mutex::new(())),
            sign_outs: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Number of forced sign-outs so far. Observers compare it with the value
    /// they saw when their session started.
    pub fn sign_outs(&self) -> u64 {
        self.sign_outs.load(Ordering::SeqCst)
    }

    /// Send an authenticated request, refreshing and retrying once on 401.
    pub async fn request(&self, method: Method, url: &str, body: RequestBody) -> Result<Response, ClientError> {
        let access_token = self.tokens.get_credential().await.map(|c| c.access_token().to_string());
        let response = self.send(method.clone(), url, &body, access_token.as_deref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let gate = self.refresh_gate.lock().await;

        let stored = self.tokens.get_credential().await.map(|c| c.access_token().to_string());
        let fresh = match stored.filter(|t| Some(t.as_str()) != access_token.as_deref()) {
            Some(stored) => {
                tracing::debug!(%method, url, "access token already refreshed, retrying");
                stored
            }
            None => {
                tracing::debug!(%method, url, "access token rejected, refreshing");
                match self.refresh().await {
                    Ok(fresh) => fresh,
                    Err(err) => {
                        tracing::warn!(error = %err, "token refresh failed, signing out");
                        if let Err(clear_err) = self.tokens.clear_credential().await {
                            tracing::error!(error = %clear_err, "failed to clear credential");
                        }
                        self.sign_outs.fetch_add(1, Ordering::SeqCst);
                        return Err(err);
                    }
                }
            }
        };
        drop(gate);

        self.send(method, url, &body, Some(&fresh)).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: &RequestBody,
        access_token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut req = self.http.request(method, url);
        if let Some(token) = access_token {
            req = req.bearer_auth(token);
        }

        req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => req.json(value),
            // reqwest sets the multipart Content-Type with its boundary.
            RequestBody::Multipart(form) => req.multipart(form.to_reqwest()?),
        };

        Ok(req.send().await?)
    }

    /// Exchange the refresh token for a new pair; returns the new access token.
    async fn refresh(&self) -> Result<String, ClientError> {
        let credential = self.tokens.get_credential().await;
        let Some(refresh_token) = credential.as_ref().and_then(|c| c.refresh_token()) else {
            return Err(ClientError::RefreshFailed("no refresh token available".into()));
        };
        let device_id = self.tokens.device_id().await?.to_string();

        let response = self
            .http
            .post(self.endpoints.refresh_token())
            .json(&RefreshRequest {
                refresh_token,
                identifier: &device_id,
            })
            .send()
            .await
            .map_err(|e| ClientError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::RefreshFailed(format!(
                "refresh rejected with status {}",
                status.as_u16()
            )));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ClientError::RefreshFailed(e.to_string()))?;
        let tokens = auth
            .into_token_pair()
            .map_err(|e| ClientError::RefreshFailed(e.to_string()))?;

        self.tokens.replace_tokens(&tokens).await?;
        tracing::info!("access token refreshed");
        Ok(tokens.access_token)
    }

    /// Unauthenticated JSON POST (login).
    pub async fn post_public<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Response, ClientError> {
        Ok(self.http.post(url).json(body).send().await?)
    }

    pub async fn get_envelope<T: DeserializeOwned>(&self, url: &str) -> Result<ApiEnvelope<T>, ClientError> {
        self.send_envelope(Method::GET, url, RequestBody::Empty).await
    }

    pub async fn send_envelope<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
    ) -> Result<ApiEnvelope<T>, ClientError> {
        let response = self.request(method, url, body).await?;
        read_envelope(response).await
    }
}

/// Decode a backend envelope.
///
/// 204 is an empty success; any other non-2xx status becomes
/// [`ClientError::Api`] carrying the backend message when there is one.
pub async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<ApiEnvelope<T>, ClientError> {
    let status = response.status();

    if status == StatusCode::NO_CONTENT {
        return Ok(ApiEnvelope {
            success: true,
            message: String::new(),
            data: None,
            pagination: None,
        });
    }

    if !status.is_success() {
        return Err(api_error(response).await);
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

pub(crate) async fn api_error(response: Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    ClientError::Api {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_form_keeps_field_order_and_values() {
        let mut form = MultipartForm::new();
        form.add_text("id", "u1");
        form.add_text("firstName", "Ada");
        form.add_file("image", "a.png", Some("image/png".into()), vec![1, 2, 3]);

        assert_eq!(form.text_value("firstName"), Some("Ada"));
        assert_eq!(form.text_value("image"), None);
        assert!(form.has_field("image"));
        assert_eq!(form.field_names().collect::<Vec<_>>(), vec!["id", "firstName", "image"]);
        assert!(form.to_reqwest().is_ok());
    }

    #[test]
    fn bad_mime_type_is_an_invalid_request() {
        let mut form = MultipartForm::new();
        form.add_file("image", "a.png", Some("not a mime\n".into()), vec![]);
        assert!(matches!(form.to_reqwest(), Err(ClientError::InvalidRequest(_))));
    }
}
