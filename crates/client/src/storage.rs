//! Client-side persistence: durable key/value backend, cookie jar, local and
//! session stores.
//!
//! `ClientStorage` models one browser profile. Cookies with an expiry and the
//! local store are written through to the durable backend; session cookies
//! and the session store live in memory and are lost when the storage is
//! reopened (the equivalent of restarting the client).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use console_auth::expiry::is_live;

use crate::error::StorageError;

const COOKIE_PREFIX: &str = "cookie:";
const LOCAL_PREFIX: &str = "local:";

/// Durable string key/value backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// In-memory backend. Survives `ClientStorage` reopen as long as the same
/// `Arc` is reused, which is how tests simulate a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// SQLite-backed durable store (lazy initialization).
#[derive(Debug, Clone)]
pub struct SqliteStore {
    url: String,
    path: Option<PathBuf>,
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SqliteStore {
    /// Store backed by a database file; the file is created on first use.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            url: format!("sqlite://{}", path.to_string_lossy()),
            path: Some(path),
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            path: None,
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// `{data_dir}/console-admin/storage.db`
    pub fn default_path() -> Result<PathBuf, StorageError> {
        let base = dirs::data_dir()
            .ok_or_else(|| StorageError::Location("no per-user data directory".into()))?;
        Ok(base.join("console-admin").join("storage.db"))
    }

    async fn get_pool(&self) -> Result<SqlitePool, StorageError> {
        let mut guard = self.pool.lock().await;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }

        if let Some(parent) = self.path.as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Location(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&self.url)?.create_if_missing(true);
        // A single long-lived connection keeps in-memory databases alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        tracing::debug!(url = %self.url, "durable storage initialized");
        *guard = Some(pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let pool = self.get_pool().await?;
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let pool = self.get_pool().await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key)
            DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .execute(&pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM kv WHERE key = ?1")
            .bind(key)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let pool = self.get_pool().await?;
        let rows = sqlx::query("SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")
            .bind(prefix)
            .fetch_all(&pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(StorageError::from))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCookie {
    value: String,
    expires_at: DateTime<Utc>,
}

/// One client profile: cookie jar plus local and session stores.
#[derive(Debug)]
pub struct ClientStorage {
    durable: Arc<dyn KeyValueStore>,
    session_cookies: RwLock<HashMap<String, String>>,
    session_store: RwLock<HashMap<String, String>>,
}

impl ClientStorage {
    /// Open a profile over `durable`, purging cookies that expired while closed.
    pub async fn open(durable: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let now = Utc::now();
        let mut purged = 0usize;

        for key in durable.keys_with_prefix(COOKIE_PREFIX).await? {
            let expired = match durable.get(&key).await? {
                Some(raw) => match serde_json::from_str::<PersistedCookie>(&raw) {
                    Ok(cookie) => !is_live(Some(cookie.expires_at), now),
                    Err(_) => true,
                },
                None => false,
            };
            if expired {
                durable.remove(&key).await?;
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::debug!(purged, "purged expired cookies");
        }

        Ok(Self {
            durable,
            session_cookies: RwLock::new(HashMap::new()),
            session_store: RwLock::new(HashMap::new()),
        })
    }

    /// Set a cookie. `None` expiry makes it a session cookie.
    ///
    /// A cookie replaces any earlier cookie with the same name regardless of
    /// its lifetime.
    pub async fn set_cookie(
        &self,
        name: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let key = cookie_key(name);
        match expires_at {
            Some(expires_at) => {
                self.session_cookies_mut().remove(name);
                let raw = serde_json::to_string(&PersistedCookie {
                    value: value.to_string(),
                    expires_at,
                })?;
                self.durable.set(&key, &raw).await
            }
            None => {
                self.durable.remove(&key).await?;
                self.session_cookies_mut()
                    .insert(name.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    pub async fn cookie(&self, name: &str) -> Result<Option<String>, StorageError> {
        let session_value = self.session_cookies_ref().get(name).cloned();
        if session_value.is_some() {
            return Ok(session_value);
        }

        let key = cookie_key(name);
        let Some(raw) = self.durable.get(&key).await? else {
            return Ok(None);
        };
        let cookie: PersistedCookie = serde_json::from_str(&raw)?;
        if is_live(Some(cookie.expires_at), Utc::now()) {
            Ok(Some(cookie.value))
        } else {
            self.durable.remove(&key).await?;
            Ok(None)
        }
    }

    pub async fn remove_cookie(&self, name: &str) -> Result<(), StorageError> {
        self.session_cookies_mut().remove(name);
        self.durable.remove(&cookie_key(name)).await
    }

    pub async fn local_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.durable.get(&local_key(key)).await
    }

    pub async fn local_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.durable.set(&local_key(key), value).await
    }

    pub async fn local_remove(&self, key: &str) -> Result<(), StorageError> {
        self.durable.remove(&local_key(key)).await
    }

    pub fn session_get(&self, key: &str) -> Option<String> {
        self.session_store
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn session_set(&self, key: &str, value: &str) {
        self.session_store
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    pub fn session_remove(&self, key: &str) {
        self.session_store
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    fn session_cookies_ref(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, String>> {
        self.session_cookies.read().unwrap_or_else(|e| e.into_inner())
    }

    fn session_cookies_mut(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.session_cookies.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn cookie_key(name: &str) -> String {
    format!("{COOKIE_PREFIX}{name}")
}

fn local_key(key: &str) -> String {
    format!("{LOCAL_PREFIX}{key}")
}
