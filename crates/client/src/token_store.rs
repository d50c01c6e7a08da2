//! Credential persistence over the client storage.
//!
//! Tokens live in two cookies whose lifetime follows the "remember me"
//! choice: session cookies when unchecked, 30-day cookies when checked. The
//! flag itself is kept in the local store so refreshed tokens inherit it.

use std::sync::Arc;

use chrono::Utc;

use console_auth::{DeviceId, ExpiryPolicy, LoginPayload, StoredLoginPayload, TokenPair};

use crate::error::StorageError;
use crate::storage::ClientStorage;

pub const ACCESS_TOKEN_COOKIE: &str = "console-admin-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "console-admin-refresh-token";
pub const REMEMBER_ME_KEY: &str = "rememberMe";
pub const SAVED_EMAIL_KEY: &str = "savedEmail";
pub const DEVICE_ID_KEY: &str = "app_device_id";
pub const LOGIN_PAYLOAD_KEY: &str = "loginPayload";

/// The stored token pair.
///
/// The refresh token is only visible inside this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
    expiry: ExpiryPolicy,
}

impl Credential {
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn expiry(&self) -> ExpiryPolicy {
        self.expiry
    }

    pub(crate) fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TokenStore {
    storage: Arc<ClientStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<ClientStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<ClientStorage> {
        &self.storage
    }

    /// Persist a freshly issued token pair.
    ///
    /// With a login payload, the password-free copy goes to the session store
    /// and the email is remembered for the sign-in form when `remember_me`.
    pub async fn set_credential(
        &self,
        tokens: &TokenPair,
        remember_me: bool,
        payload: Option<&LoginPayload>,
    ) -> Result<(), StorageError> {
        let policy = ExpiryPolicy::from_remember_me(remember_me);
        self.write_tokens(tokens, policy).await?;
        self.storage
            .local_set(REMEMBER_ME_KEY, if remember_me { "true" } else { "false" })
            .await?;

        if let Some(payload) = payload {
            let stored = serde_json::to_string(&payload.to_stored())?;
            self.storage.session_set(LOGIN_PAYLOAD_KEY, &stored);

            if remember_me {
                self.storage.local_set(SAVED_EMAIL_KEY, &payload.email).await?;
            } else {
                self.storage.local_remove(SAVED_EMAIL_KEY).await?;
            }
        }

        tracing::debug!(remember_me, "credential stored");
        Ok(())
    }

    /// Store refreshed tokens under the lifetime chosen at login.
    pub(crate) async fn replace_tokens(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        let policy = ExpiryPolicy::from_remember_me(self.remember_me().await);
        self.write_tokens(tokens, policy).await
    }

    async fn write_tokens(&self, tokens: &TokenPair, policy: ExpiryPolicy) -> Result<(), StorageError> {
        let expires_at = policy.expires_at(Utc::now());
        self.storage
            .set_cookie(ACCESS_TOKEN_COOKIE, &tokens.access_token, expires_at)
            .await?;
        // Refresh endpoints may not rotate the refresh token.
        if let Some(refresh_token) = &tokens.refresh_token {
            self.storage
                .set_cookie(REFRESH_TOKEN_COOKIE, refresh_token, expires_at)
                .await?;
        }
        Ok(())
    }

    /// Current tokens, or `None` when signed out or when storage is unreadable.
    pub async fn get_credential(&self) -> Option<Credential> {
        let access_token = match self.storage.cookie(ACCESS_TOKEN_COOKIE).await {
            Ok(Some(token)) if !token.is_empty() => token,
            Ok(_) => return None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read access token");
                return None;
            }
        };

        let refresh_token = match self.storage.cookie(REFRESH_TOKEN_COOKIE).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read refresh token");
                None
            }
        };

        Some(Credential {
            access_token,
            refresh_token,
            expiry: ExpiryPolicy::from_remember_me(self.remember_me().await),
        })
    }

    /// Remove both tokens and the remember-me flag. Idempotent.
    pub async fn clear_credential(&self) -> Result<(), StorageError> {
        self.storage.remove_cookie(ACCESS_TOKEN_COOKIE).await?;
        self.storage.remove_cookie(REFRESH_TOKEN_COOKIE).await?;
        self.storage.local_remove(REMEMBER_ME_KEY).await?;
        tracing::debug!("credential cleared");
        Ok(())
    }

    /// Forget everything the sign-in form pre-fills.
    pub async fn clear_remembered(&self) -> Result<(), StorageError> {
        self.storage.local_remove(REMEMBER_ME_KEY).await?;
        self.storage.local_remove(SAVED_EMAIL_KEY).await?;
        self.storage.session_remove(LOGIN_PAYLOAD_KEY);
        Ok(())
    }

    pub async fn remember_me(&self) -> bool {
        match self.storage.local_get(REMEMBER_ME_KEY).await {
            Ok(flag) => flag.as_deref() == Some("true"),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read remember-me flag");
                false
            }
        }
    }

    pub async fn saved_email(&self) -> Option<String> {
        self.storage
            .local_get(SAVED_EMAIL_KEY)
            .await
            .ok()
            .flatten()
            .filter(|e| !e.is_empty())
    }

    pub fn last_login_payload(&self) -> Option<StoredLoginPayload> {
        let raw = self.storage.session_get(LOGIN_PAYLOAD_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(payload) => Some(payload),
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable login payload");
                None
            }
        }
    }

    /// Persistent device id, generated on first use.
    pub async fn device_id(&self) -> Result<DeviceId, StorageError> {
        if let Some(raw) = self.storage.local_get(DEVICE_ID_KEY).await? {
            match raw.parse::<DeviceId>() {
                Ok(id) => return Ok(id),
                Err(err) => tracing::warn!(error = %err, "replacing malformed device id"),
            }
        }

        let id = DeviceId::new();
        self.storage.local_set(DEVICE_ID_KEY, &id.to_string()).await?;
        tracing::info!(device_id = %id, "generated device id");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use console_auth::{DeviceInfo, DeviceType};

    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};

    async fn store_over(durable: &Arc<MemoryStore>) -> TokenStore {
        let storage = ClientStorage::open(durable.clone() as Arc<dyn KeyValueStore>)
            .await
            .unwrap();
        TokenStore::new(Arc::new(storage))
    }

    fn pair(access: &str, refresh: Option<&str>) -> TokenPair {
        TokenPair {
            access_token: access.into(),
            refresh_token: refresh.map(Into::into),
        }
    }

    fn payload() -> LoginPayload {
        let device = DeviceInfo {
            device_id: DeviceId::new(),
            device_name: Some("ops-laptop".into()),
            device_type: DeviceType::Web,
            app_version: "1.0.0".into(),
            os_version: None,
            push_token: None,
            location: None,
        };
        LoginPayload::new("ada@example.com", "s3cret", device)
    }

    #[tokio::test]
    async fn session_credentials_are_gone_after_restart() {
        let durable = Arc::new(MemoryStore::new());
        let tokens = store_over(&durable).await;
        tokens
            .set_credential(&pair("a1", Some("r1")), false, None)
            .await
            .unwrap();

        let credential = tokens.get_credential().await.unwrap();
        assert_eq!(credential.access_token(), "a1");
        assert_eq!(credential.refresh_token(), Some("r1"));
        assert_eq!(credential.expiry(), ExpiryPolicy::Session);

        let restarted = store_over(&durable).await;
        assert!(restarted.get_credential().await.is_none());
    }

    #[tokio::test]
    async fn remembered_credentials_survive_restart() {
        let durable = Arc::new(MemoryStore::new());
        let tokens = store_over(&durable).await;
        tokens
            .set_credential(&pair("a1", Some("r1")), true, Some(&payload()))
            .await
            .unwrap();

        let restarted = store_over(&durable).await;
        let credential = restarted.get_credential().await.unwrap();
        assert_eq!(credential.access_token(), "a1");
        assert_eq!(credential.expiry(), ExpiryPolicy::Days(30));
        assert!(restarted.remember_me().await);
        assert_eq!(restarted.saved_email().await.as_deref(), Some("ada@example.com"));
        // The login payload is per-session.
        assert!(restarted.last_login_payload().is_none());
    }

    #[tokio::test]
    async fn login_payload_is_kept_without_password() {
        let durable = Arc::new(MemoryStore::new());
        let tokens = store_over(&durable).await;
        tokens
            .set_credential(&pair("a1", None), false, Some(&payload()))
            .await
            .unwrap();

        let raw = tokens.storage().session_get(LOGIN_PAYLOAD_KEY).unwrap();
        assert!(!raw.contains("s3cret"));
        assert_eq!(tokens.last_login_payload().unwrap().email, "ada@example.com");
        assert_eq!(tokens.saved_email().await, None);
    }

    #[tokio::test]
    async fn refreshed_tokens_keep_the_login_lifetime() {
        let durable = Arc::new(MemoryStore::new());
        let tokens = store_over(&durable).await;
        tokens
            .set_credential(&pair("a1", Some("r1")), true, None)
            .await
            .unwrap();
        tokens.replace_tokens(&pair("a2", None)).await.unwrap();

        let restarted = store_over(&durable).await;
        let credential = restarted.get_credential().await.unwrap();
        assert_eq!(credential.access_token(), "a2");
        assert_eq!(credential.refresh_token(), Some("r1"));
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let durable = Arc::new(MemoryStore::new());
        let tokens = store_over(&durable).await;
        tokens
            .set_credential(&pair("a1", Some("r1")), true, None)
            .await
            .unwrap();

        tokens.clear_credential().await.unwrap();
        tokens.clear_credential().await.unwrap();
        assert!(tokens.get_credential().await.is_none());
        assert!(!tokens.remember_me().await);
    }

    #[tokio::test]
    async fn device_id_is_generated_once() {
        let durable = Arc::new(MemoryStore::new());
        let first = store_over(&durable).await.device_id().await.unwrap();
        let second = store_over(&durable).await.device_id().await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn credential_debug_hides_tokens() {
        let credential = Credential {
            access_token: "secret-access".into(),
            refresh_token: Some("secret-refresh".into()),
            expiry: ExpiryPolicy::Session,
        };
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret"));
    }
}
