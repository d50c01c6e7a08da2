//! Admin-user directory: paged list, selected user, CRUD.

use std::sync::RwLock;

use serde_json::{Value, json};

use console_core::{AdminUser, ApiEnvelope, Pagination, UserId};

use crate::error::ClientError;
use crate::http::{HttpClient, Method, MultipartForm, RequestBody};

pub const DEFAULT_DELETE_REMARK: &str = "User no longer active";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Query of the user list. Unset fields are left off the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortOrder>,
}

impl ListParams {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(page) = self.page.filter(|p| *p > 0) {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            query.push(("limit", limit.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        if let Some(sort) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            query.push(("sort", sort.to_string()));
        }
        if let Some(order) = self.order {
            query.push(("order", order.as_str().to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserPage {
    pub users: Vec<AdminUser>,
    pub pagination: Pagination,
}

impl UserPage {
    fn empty() -> Self {
        Self {
            users: Vec::new(),
            pagination: Pagination {
                current_page: 1,
                total_pages: 0,
                total_records: 0,
            },
        }
    }
}

/// Result of an add/update/delete.
///
/// `error` keeps the typed failure so a caller can tell an expired session
/// from a business-rule rejection.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<ClientError>,
}

impl MutationOutcome {
    fn succeeded(message: String) -> Self {
        Self {
            success: true,
            message: (!message.is_empty()).then_some(message),
            error: None,
        }
    }

    fn failed(error: ClientError) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            error: Some(error),
        }
    }

    pub fn session_expired(&self) -> bool {
        self.error.as_ref().is_some_and(ClientError::is_session_expired)
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    page: Option<UserPage>,
    selected: Option<AdminUser>,
    loading: bool,
    error: Option<String>,
    last_params: ListParams,
}

#[derive(Debug)]
pub struct UserDirectory {
    http: HttpClient,
    state: RwLock<DirectoryState>,
}

impl UserDirectory {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            state: RwLock::new(DirectoryState::default()),
        }
    }

    fn modify(&self, f: impl FnOnce(&mut DirectoryState)) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        f(&mut state);
    }

    fn read<R>(&self, f: impl FnOnce(&DirectoryState) -> R) -> R {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    /// The last fetched page of users (the bulk list).
    pub fn users(&self) -> Vec<AdminUser> {
        self.read(|s| s.page.as_ref().map(|p| p.users.clone()).unwrap_or_default())
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.read(|s| s.page.as_ref().map(|p| p.pagination))
    }

    pub fn selected(&self) -> Option<AdminUser> {
        self.read(|s| s.selected.clone())
    }

    pub fn select(&self, user: Option<AdminUser>) {
        self.modify(|s| s.selected = user);
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.loading)
    }

    pub fn last_error(&self) -> Option<String> {
        self.read(|s| s.error.clone())
    }

    /// Fetch a page of users and keep it as the bulk list.
    pub async fn list(&self, params: ListParams) -> Result<UserPage, ClientError> {
        self.modify(|s| {
            s.loading = true;
            s.error = None;
            s.last_params = params.clone();
        });

        let result = self.fetch_page(&params).await;
        match &result {
            Ok(page) => {
                tracing::debug!(count = page.users.len(), total = page.pagination.total_records, "users listed");
                let page = page.clone();
                self.modify(|s| {
                    s.page = Some(page);
                    s.loading = false;
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to list users");
                let message = err.to_string();
                self.modify(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
            }
        }
        result
    }

    async fn fetch_page(&self, params: &ListParams) -> Result<UserPage, ClientError> {
        let url = reqwest::Url::parse_with_params(&self.http.endpoints().users(), params.query())
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let envelope: ApiEnvelope<Vec<AdminUser>> = self.http.get_envelope(url.as_str()).await?;

        // 204 decodes to an envelope without data or pagination.
        if envelope.data.is_none() && envelope.pagination.is_none() {
            return Ok(UserPage::empty());
        }

        let pagination = envelope.pagination.unwrap_or(Pagination {
            current_page: 1,
            ..Pagination::default()
        });
        Ok(UserPage {
            users: envelope.data.unwrap_or_default(),
            pagination: Pagination {
                current_page: pagination.current_page.max(1),
                ..pagination
            },
        })
    }

    /// Fetch one user and make it the selected user.
    pub async fn fetch_by_id(&self, id: &UserId) -> Result<AdminUser, ClientError> {
        self.modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let result: Result<AdminUser, ClientError> = async {
            let envelope = self.http.get_envelope::<AdminUser>(&self.http.endpoints().user(id)).await?;
            if !envelope.success {
                return Err(ClientError::rejected(non_empty_or(envelope.message, "Failed to fetch user")));
            }
            envelope
                .data
                .ok_or_else(|| ClientError::Decode("user response carried no user".into()))
        }
        .await;

        match &result {
            Ok(user) => {
                let user = user.clone();
                self.modify(|s| {
                    s.selected = Some(user);
                    s.loading = false;
                });
            }
            Err(err) => {
                tracing::warn!(user_id = %id, error = %err, "failed to fetch user");
                let message = err.to_string();
                self.modify(|s| {
                    s.error = Some(message);
                    s.loading = false;
                });
            }
        }
        result
    }

    pub async fn add(&self, form: MultipartForm) -> MutationOutcome {
        let url = self.http.endpoints().add_user();
        let outcome = self
            .mutate(Method::POST, &url, RequestBody::Multipart(form), "Failed to add user")
            .await;

        match outcome {
            Ok((message, _)) => {
                tracing::info!("user added");
                self.relist().await;
                MutationOutcome::succeeded(message)
            }
            Err(err) => self.fail("add", err),
        }
    }

    /// Submit an edit; returned fields are merged into the cached copies.
    pub async fn update(&self, id: &UserId, form: MultipartForm) -> MutationOutcome {
        let url = self.http.endpoints().edit_user();
        let outcome = self
            .mutate(Method::POST, &url, RequestBody::Multipart(form), "Failed to update user")
            .await;

        match outcome {
            Ok((message, data)) => {
                if let Some(patch) = data.filter(Value::is_object) {
                    self.modify(|s| {
                        if let Some(page) = s.page.as_mut() {
                            for user in page.users.iter_mut().filter(|u| &u.id == id) {
                                *user = merge_user(user, &patch);
                            }
                        }
                        if let Some(selected) = s.selected.as_mut().filter(|u| &u.id == id) {
                            *selected = merge_user(selected, &patch);
                        }
                    });
                }
                tracing::info!(user_id = %id, "user updated");
                self.relist().await;
                MutationOutcome::succeeded(message)
            }
            Err(err) => self.fail("update", err),
        }
    }

    pub async fn delete(&self, id: &UserId, reason: Option<&str>) -> MutationOutcome {
        let remark = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_DELETE_REMARK);
        let body = json!({ "id": id, "deleteRemark": remark });
        let url = self.http.endpoints().delete_user();
        let outcome = self
            .mutate(Method::DELETE, &url, RequestBody::Json(body), "Failed to delete user")
            .await;

        match outcome {
            Ok((message, _)) => {
                self.modify(|s| {
                    if let Some(page) = s.page.as_mut() {
                        page.users.retain(|u| &u.id != id);
                    }
                    if s.selected.as_ref().is_some_and(|u| &u.id == id) {
                        s.selected = None;
                    }
                });
                tracing::info!(user_id = %id, "user deleted");
                self.relist().await;
                MutationOutcome::succeeded(message)
            }
            Err(err) => self.fail("delete", err),
        }
    }

    async fn mutate(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
        fallback: &str,
    ) -> Result<(String, Option<Value>), ClientError> {
        self.modify(|s| {
            s.loading = true;
            s.error = None;
        });

        let envelope = self.http.send_envelope::<Value>(method, url, body).await?;
        if !envelope.success {
            return Err(ClientError::rejected(non_empty_or(envelope.message, fallback)));
        }
        Ok((envelope.message, envelope.data))
    }

    fn fail(&self, action: &'static str, err: ClientError) -> MutationOutcome {
        tracing::warn!(action, error = %err, "user mutation failed");
        let message = err.to_string();
        self.modify(|s| {
            s.error = Some(message);
            s.loading = false;
        });
        MutationOutcome::failed(err)
    }

    /// Reload the list with the last query after a successful mutation.
    async fn relist(&self) {
        let params = self.read(|s| s.last_params.clone());
        if let Err(err) = self.list(params).await {
            tracing::warn!(error = %err, "failed to refresh user list");
        }
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Overlay the fields of `patch` onto `user`.
///
/// Merging happens on the wire shape so a flat `businessUnitId` in the patch
/// supersedes the embedded reference the same way it does on decode. A patch
/// that no longer decodes leaves the user unchanged.
pub fn merge_user(user: &AdminUser, patch: &Value) -> AdminUser {
    let Ok(Value::Object(mut merged)) = serde_json::to_value(user) else {
        return user.clone();
    };
    if let Value::Object(fields) = patch {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or_else(|err| {
        tracing::warn!(user_id = %user.id, error = %err, "ignoring undecodable user patch");
        user.clone()
    })
}
