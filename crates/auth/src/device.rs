//! Device metadata sent with the login call.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use console_core::DomainError;

/// Stable per-installation identifier; also the refresh `identifier`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for DeviceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s.trim())
            .map(Self)
            .map_err(|e| DomainError::invalid_id(format!("DeviceId: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Web,
}

/// Everything the login endpoint wants to know about the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: DeviceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    pub device_type: DeviceType,
    pub app_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl DeviceInfo {
    /// Describe the current host.
    pub fn detect(device_id: DeviceId, app_version: impl Into<String>) -> Self {
        let device_name = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .ok()
            .filter(|h| !h.is_empty())
            .or_else(|| Some(std::env::consts::OS.to_string()));

        Self {
            device_id,
            device_name,
            device_type: device_type_for(std::env::consts::OS),
            app_version: app_version.into(),
            os_version: None,
            push_token: None,
            location: None,
        }
    }
}

fn device_type_for(os: &str) -> DeviceType {
    match os {
        "android" | "ios" => DeviceType::Mobile,
        _ => DeviceType::Web,
    }
}

/// Credentials + device metadata posted to the login endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub device: DeviceInfo,
}

impl LoginPayload {
    pub fn new(email: impl Into<String>, password: impl Into<String>, device: DeviceInfo) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            device,
        }
    }

    /// The payload as it is kept for device-fingerprint reuse: no password.
    pub fn to_stored(&self) -> StoredLoginPayload {
        StoredLoginPayload {
            email: self.email.clone(),
            device: self.device.clone(),
        }
    }
}

impl core::fmt::Debug for LoginPayload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginPayload")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("device", &self.device)
            .finish()
    }
}

/// Last login payload minus the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredLoginPayload {
    pub email: String,
    #[serde(flatten)]
    pub device: DeviceInfo,
}
