//! Wiring of the client services.

use std::sync::Arc;

use thiserror::Error;

use console_auth::{DeviceInfo, LoginPayload, SessionStatus};
use console_core::UserId;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::form::{FormMode, FormOrchestrator};
use crate::http::HttpClient;
use crate::reference::ReferenceDataCache;
use crate::session::SessionController;
use crate::storage::{ClientStorage, KeyValueStore};
use crate::token_store::TokenStore;
use crate::users::UserDirectory;

/// A running console client.
///
/// Construction awaits session bootstrap, so anything obtained from a
/// context sees a settled session.
#[derive(Debug)]
pub struct AppContext {
    config: ClientConfig,
    storage: Arc<ClientStorage>,
    tokens: Arc<TokenStore>,
    http: HttpClient,
    session: Arc<SessionController>,
    reference: Arc<ReferenceDataCache>,
    users: Arc<UserDirectory>,
}

impl AppContext {
    /// Open storage over `durable` and bootstrap the session.
    pub async fn start(config: ClientConfig, durable: Arc<dyn KeyValueStore>) -> Result<Self, ClientError> {
        let storage = ClientStorage::open(durable).await?;
        Self::assemble(config, Arc::new(storage)).await
    }

    async fn assemble(config: ClientConfig, storage: Arc<ClientStorage>) -> Result<Self, ClientError> {
        let tokens = Arc::new(TokenStore::new(storage.clone()));
        let http = HttpClient::new(&config, tokens.clone())?;
        let session = Arc::new(SessionController::new(http.clone()));
        let reference = Arc::new(ReferenceDataCache::new(http.clone()));
        let users = Arc::new(UserDirectory::new(http.clone()));

        let status = session.bootstrap().await;
        tracing::info!(api_url = %config.api_url, status = status.as_str(), "console client started");

        Ok(Self {
            config,
            storage,
            tokens,
            http,
            session,
            reference,
            users,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn reference(&self) -> &Arc<ReferenceDataCache> {
        &self.reference
    }

    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.users
    }

    /// Sign in with this device's identity.
    pub async fn login(&self, email: &str, password: &str, remember_me: bool) -> Result<bool, ClientError> {
        let device_id = self.tokens.device_id().await?;
        let device = DeviceInfo::detect(device_id, self.config.app_version.clone());
        let payload = LoginPayload::new(email.trim(), password, device);
        Ok(self.session.login(payload, remember_me).await)
    }

    pub async fn new_user_form(&self) -> Result<FormOrchestrator, ClientError> {
        self.open_form(FormMode::Create).await
    }

    pub async fn edit_user_form(&self, id: UserId) -> Result<FormOrchestrator, ClientError> {
        self.open_form(FormMode::Edit(id)).await
    }

    async fn open_form(&self, mode: FormMode) -> Result<FormOrchestrator, ClientError> {
        if !self.session.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        let form = FormOrchestrator::new(mode, self.reference.clone(), self.users.clone());
        form.initialize().await?;
        Ok(form)
    }

    /// Sign out and reload: every in-memory cache is dropped and a fresh
    /// context is bootstrapped over the same storage.
    ///
    /// On failure the consumed context comes back inside the error.
    pub async fn logout(self) -> Result<AppContext, LogoutError> {
        let reloaded = match self.session.logout().await {
            Ok(()) => Self::assemble(self.config.clone(), self.storage.clone()).await,
            Err(err) => Err(err),
        };

        reloaded.map_err(|source| {
            tracing::error!(error = %source, "sign-out failed");
            LogoutError {
                context: Box::new(self),
                source,
            }
        })
    }
}

/// A failed [`AppContext::logout`], carrying the context it consumed.
#[derive(Debug, Error)]
#[error("sign-out failed: {source}")]
pub struct LogoutError {
    pub context: Box<AppContext>,
    pub source: ClientError,
}

impl LogoutError {
    pub fn into_parts(self) -> (AppContext, ClientError) {
        (*self.context, self.source)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStore;

    /// Memory store whose removals can be switched off.
    #[derive(Debug, Default)]
    struct LockedStore {
        inner: MemoryStore,
        locked: AtomicBool,
    }

    #[async_trait]
    impl KeyValueStore for LockedStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<(), StorageError> {
            if self.locked.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("database is locked".into()));
            }
            self.inner.remove(key).await
        }

        async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.keys_with_prefix(prefix).await
        }
    }

    #[tokio::test]
    async fn failed_logout_hands_the_context_back() {
        let store = Arc::new(LockedStore::default());
        store.locked.store(true, Ordering::SeqCst);

        let ctx = AppContext::start(ClientConfig::new("http://127.0.0.1:9"), store.clone())
            .await
            .unwrap();

        let (ctx, err) = ctx.logout().await.unwrap_err().into_parts();
        assert!(matches!(err, ClientError::Storage(StorageError::Backend(_))), "{err:?}");
        assert_eq!(ctx.config().api_url, "http://127.0.0.1:9");

        store.locked.store(false, Ordering::SeqCst);
        let ctx = ctx.logout().await.unwrap();
        assert_eq!(ctx.status(), SessionStatus::Unauthenticated);
    }
}
