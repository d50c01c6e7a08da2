//! Token wire shapes for the login and refresh endpoints.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Access/refresh pair extracted from an auth response.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl core::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("auth response carried no access token")]
    MissingAccessToken,
}

/// Response of the login and refresh endpoints.
///
/// Tokens may sit under `data` (`accessToken`/`refreshToken`) or at the top
/// level (`access_token`, `api_token`, `refreshToken`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    data: Option<AuthData>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    api_token: Option<String>,
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthData {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl AuthResponse {
    pub fn into_token_pair(self) -> Result<TokenPair, TokenError> {
        let (data_access, data_refresh) = match self.data {
            Some(d) => (d.access_token, d.refresh_token),
            None => (None, None),
        };

        let access_token = [data_access, self.access_token, self.api_token]
            .into_iter()
            .flatten()
            .find(|t| !t.is_empty())
            .ok_or(TokenError::MissingAccessToken)?;
        let refresh_token = data_refresh
            .into_iter()
            .chain(self.refresh_token)
            .find(|t| !t.is_empty());

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

/// Body of the refresh-token call.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
    pub identifier: &'a str,
}
