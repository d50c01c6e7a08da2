//! Session lifecycle: bootstrap, login, logout.
//!
//! A session lives only as long as its credential. When a failed token
//! refresh signs the user out underneath an authenticated session, the next
//! status read reports `Unauthenticated`.

use std::sync::{Arc, RwLock};

use console_auth::{AuthResponse, LoginPayload, Session, SessionStatus};
use console_core::AdminUser;

use crate::error::ClientError;
use crate::http::{HttpClient, api_error};
use crate::token_store::TokenStore;

#[derive(Debug)]
pub struct SessionController {
    http: HttpClient,
    tokens: Arc<TokenStore>,
    state: RwLock<State>,
}

#[derive(Debug)]
struct State {
    status: SessionStatus,
    // `HttpClient::sign_outs` when `status` was set.
    sign_outs: u64,
}

impl SessionController {
    pub fn new(http: HttpClient) -> Self {
        let tokens = http.tokens().clone();
        let sign_outs = http.sign_outs();
        Self {
            http,
            tokens,
            state: RwLock::new(State {
                status: SessionStatus::Bootstrapping,
                sign_outs,
            }),
        }
    }

    pub fn status(&self) -> SessionStatus {
        let sign_outs = self.http.sign_outs();
        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if !state.status.is_authenticated() || state.sign_outs == sign_outs {
                return state.status.clone();
            }
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.status.is_authenticated() && state.sign_outs != sign_outs {
            tracing::info!("session expired, credential was cleared");
            state.status = SessionStatus::Unauthenticated;
            state.sign_outs = sign_outs;
        }
        state.status.clone()
    }

    pub fn current(&self) -> Option<Session> {
        self.status().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status().is_authenticated()
    }

    fn set_status(&self, status: SessionStatus) {
        tracing::debug!(status = status.as_str(), "session status changed");
        let sign_outs = self.http.sign_outs();
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = State { status, sign_outs };
    }

    /// Resolve the initial status from stored credentials.
    ///
    /// Without a credential no network call is made. A failing current-user
    /// fetch clears the credential.
    pub async fn bootstrap(&self) -> SessionStatus {
        self.set_status(SessionStatus::Bootstrapping);

        if self.tokens.get_credential().await.is_none() {
            self.set_status(SessionStatus::Unauthenticated);
            return SessionStatus::Unauthenticated;
        }

        let status = match self.fetch_current_user().await {
            Ok(session) => {
                tracing::info!(user_id = %session.user_id, "session restored");
                SessionStatus::Authenticated(session)
            }
            Err(err) => {
                tracing::warn!(error = %err, "stored credential rejected");
                self.discard_credential().await;
                SessionStatus::Unauthenticated
            }
        };

        self.set_status(status.clone());
        status
    }

    /// Sign in. Returns whether the session is now authenticated; the
    /// failure reason is logged, not returned.
    pub async fn login(&self, payload: LoginPayload, remember_me: bool) -> bool {
        self.set_status(SessionStatus::Loading);

        match self.try_login(&payload, remember_me).await {
            Ok(session) => {
                tracing::info!(user_id = %session.user_id, remember_me, "signed in");
                self.set_status(SessionStatus::Authenticated(session));
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, email = %payload.email, "sign-in failed");
                self.set_status(SessionStatus::Unauthenticated);
                false
            }
        }
    }

    async fn try_login(&self, payload: &LoginPayload, remember_me: bool) -> Result<Session, ClientError> {
        let response = self.http.post_public(&self.http.endpoints().login(), payload).await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let auth: AuthResponse = response.json().await?;
        if auth.success == Some(false) {
            let message = auth.message.unwrap_or_else(|| "Invalid credentials".to_string());
            return Err(ClientError::rejected(message));
        }

        let tokens = auth
            .into_token_pair()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        self.tokens.set_credential(&tokens, remember_me, Some(payload)).await?;

        match self.fetch_current_user().await {
            Ok(session) => Ok(session),
            Err(err) => {
                self.discard_credential().await;
                Err(err)
            }
        }
    }

    /// Fetch the signed-in user.
    pub async fn fetch_current_user(&self) -> Result<Session, ClientError> {
        let envelope = self.http.get_envelope::<AdminUser>(&self.http.endpoints().me()).await?;
        let user = envelope
            .into_result()
            .map_err(ClientError::rejected)?
            .ok_or_else(|| ClientError::Decode("current-user response carried no user".into()))?;
        Ok(Session::from_user(&user))
    }

    /// Clear credentials and remembered sign-in data.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let user_id = self.current().map(|s| s.user_id);
        self.tokens.clear_credential().await?;
        self.tokens.clear_remembered().await?;
        self.set_status(SessionStatus::Unauthenticated);
        tracing::info!(user_id = ?user_id, "signed out");
        Ok(())
    }

    async fn discard_credential(&self) {
        if let Err(err) = self.tokens.clear_credential().await {
            tracing::error!(error = %err, "failed to clear credential");
        }
    }
}
