//! `console-client`
//!
//! **Responsibility:** client core of the admin console.
//!
//! This crate provides:
//! - Credential persistence with "remember me" lifetimes
//! - An HTTP client that refreshes an expired access token once and retries
//! - The session lifecycle (bootstrap, login, logout)
//! - Shared reference data with single-flight loading
//! - The admin-user directory and the create/edit form
//!
//! The backend is the authority; nothing here works offline.

pub mod cascade;
pub mod config;
pub mod context;
pub mod endpoints;
pub mod error;
pub mod form;
pub mod http;
pub mod reference;
pub mod session;
pub mod storage;
pub mod token_store;
pub mod users;

pub use config::{ClientConfig, ConfigError};
pub use context::{AppContext, LogoutError};
pub use error::{ClientError, StorageError};
pub use form::{FormMode, FormOrchestrator, UserForm};
pub use http::{HttpClient, Method, MultipartForm, RequestBody};
pub use reference::{ReferenceDataCache, ReferenceKind, ReferenceList};
pub use session::SessionController;
pub use storage::{ClientStorage, KeyValueStore, MemoryStore, SqliteStore};
pub use token_store::{Credential, TokenStore};
pub use users::{ListParams, MutationOutcome, UserDirectory, UserPage};
