//! Canonical records and their normalization from wire shapes.
//!
//! The backend is loose about shapes: `role` may be an id or an object,
//! `status` a code or `{code, label}`, `image` a file name or a metadata
//! object, and ids arrive as `_id` or `id`. Each canonical type deserializes
//! through a private wire type (`#[serde(try_from = ...)]`), so the rest of
//! the client only ever sees one shape.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{BusinessUnitId, ClientId, CountryId, RoleId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Shared pieces
// ─────────────────────────────────────────────────────────────────────────────

/// A reference to another record, with its display name when the backend
/// embedded one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedRef<I> {
    #[serde(rename = "_id")]
    pub id: I,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Role as referenced from a user record.
pub type RoleRef = NamedRef<RoleId>;

/// Lifecycle status of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub code: String,
    pub label: String,
}

impl Status {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        let label = capitalize(&code);
        Self { code, label }
    }

    pub fn active() -> Self {
        Self::new("active")
    }

    pub fn is_active(&self) -> bool {
        self.code.eq_ignore_ascii_case("active")
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::active()
    }
}

/// Uploaded image metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireRef {
    Id(String),
    Object {
        #[serde(rename = "_id", default)]
        underscore_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl WireRef {
    fn into_parts(self) -> (Option<String>, Option<String>) {
        match self {
            WireRef::Id(id) => (non_empty(Some(id)), None),
            WireRef::Object {
                underscore_id,
                id,
                name,
            } => (non_empty(underscore_id).or(non_empty(id)), non_empty(name)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireStatus {
    Code(String),
    Object {
        code: String,
        #[serde(default)]
        label: Option<String>,
    },
}

impl From<WireStatus> for Status {
    fn from(value: WireStatus) -> Self {
        match value {
            WireStatus::Code(code) => Status::new(code),
            WireStatus::Object { code, label } => match non_empty(label) {
                Some(label) => Status { code, label },
                None => Status::new(code),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireImage {
    FileName(String),
    Object(ImageRef),
}

impl From<WireImage> for ImageRef {
    fn from(value: WireImage) -> Self {
        match value {
            WireImage::FileName(file_name) => ImageRef {
                file_name: Some(file_name),
                ..ImageRef::default()
            },
            WireImage::Object(image) => image,
        }
    }
}

/// Pick the record id from `_id`, falling back to `id`.
fn pick_id(
    kind: &'static str,
    underscore_id: Option<String>,
    id: Option<String>,
) -> DomainResult<String> {
    non_empty(underscore_id)
        .or(non_empty(id))
        .ok_or_else(|| DomainError::normalization(kind, "missing _id/id"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn capitalize(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join first/last name the way the console displays people.
pub fn full_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Reference data
// ─────────────────────────────────────────────────────────────────────────────

/// Country from the location catalogue (drives the ISD-code select).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireCountry")]
#[serde(rename_all = "camelCase")]
pub struct Country {
    #[serde(rename = "_id")]
    pub id: CountryId,
    pub name: String,
    pub isd_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha2: Option<String>,
    pub flag: String,
}

impl Country {
    /// Case-insensitive name match, or a raw substring match on the ISD code.
    pub fn matches(&self, search: &str) -> bool {
        self.name.to_lowercase().contains(&search.to_lowercase()) || self.isd_code.contains(search)
    }

    /// Value used by the combined ISD/country select: `"<isd>|<countryId>"`.
    pub fn select_value(&self) -> String {
        format!("{}|{}", self.isd_code, self.id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCountry {
    #[serde(rename = "_id", default)]
    underscore_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    isd_code: String,
    #[serde(default)]
    alpha2: Option<String>,
    #[serde(default)]
    flag: Option<String>,
}

impl TryFrom<WireCountry> for Country {
    type Error = DomainError;

    fn try_from(w: WireCountry) -> DomainResult<Self> {
        Ok(Country {
            id: CountryId::new(pick_id("country", w.underscore_id, w.id)?),
            name: w.name,
            isd_code: w.isd_code,
            alpha2: non_empty(w.alpha2),
            flag: w.flag.unwrap_or_default(),
        })
    }
}

/// Client as offered in the client select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireClient")]
pub struct ClientOption {
    #[serde(rename = "_id")]
    pub id: ClientId,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireClient {
    #[serde(rename = "_id", default)]
    underscore_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
}

impl TryFrom<WireClient> for ClientOption {
    type Error = DomainError;

    fn try_from(w: WireClient) -> DomainResult<Self> {
        let id = ClientId::new(pick_id("client", w.underscore_id, w.id)?);
        let person = full_name(
            w.first_name.as_deref().unwrap_or_default(),
            w.last_name.as_deref().unwrap_or_default(),
        );
        let name = non_empty(Some(person))
            .or(non_empty(w.company_name))
            .or(non_empty(w.name))
            .unwrap_or_else(|| "Client".to_string());
        Ok(ClientOption { id, name })
    }
}

/// Business unit as offered in the dependent select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireBusinessUnit")]
pub struct BusinessUnitOption {
    #[serde(rename = "_id")]
    pub id: BusinessUnitId,
    pub name: String,
}

impl BusinessUnitOption {
    pub fn new(id: impl Into<BusinessUnitId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireBusinessUnit {
    #[serde(rename = "_id", default)]
    underscore_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
}

impl TryFrom<WireBusinessUnit> for BusinessUnitOption {
    type Error = DomainError;

    fn try_from(w: WireBusinessUnit) -> DomainResult<Self> {
        Ok(BusinessUnitOption {
            id: BusinessUnitId::new(pick_id("business unit", w.underscore_id, w.id)?),
            name: w.name,
        })
    }
}

/// RBAC role from the role catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRole")]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: RoleId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub permissions: serde_json::Value,
    pub status: Status,
}

#[derive(Debug, Deserialize)]
struct WireRole {
    #[serde(rename = "_id", default)]
    underscore_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    permissions: serde_json::Value,
    #[serde(default)]
    status: Option<WireStatus>,
}

impl TryFrom<WireRole> for Role {
    type Error = DomainError;

    fn try_from(w: WireRole) -> DomainResult<Self> {
        Ok(Role {
            id: RoleId::new(pick_id("role", w.underscore_id, w.id)?),
            name: w.name,
            description: non_empty(w.description),
            permissions: w.permissions,
            status: w.status.map(Status::from).unwrap_or_default(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Admin users
// ─────────────────────────────────────────────────────────────────────────────

/// An admin user as the console manages it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireAdminUser")]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: String,
    pub isd_code: String,
    pub country_id: Option<CountryId>,
    pub role: Option<RoleRef>,
    pub status: Status,
    pub client: Option<NamedRef<ClientId>>,
    pub business_unit: Option<NamedRef<BusinessUnitId>>,
    pub image: Option<ImageRef>,
}

impl AdminUser {
    pub fn display_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }

    pub fn client_id(&self) -> Option<&ClientId> {
        self.client.as_ref().map(|c| &c.id)
    }

    pub fn business_unit_id(&self) -> Option<&BusinessUnitId> {
        self.business_unit.as_ref().map(|b| &b.id)
    }

    /// Display name of the given business unit if this record embeds it.
    pub fn business_unit_name(&self, id: &BusinessUnitId) -> Option<&str> {
        self.business_unit
            .as_ref()
            .filter(|bu| &bu.id == id)
            .and_then(|bu| bu.name.as_deref())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAdminUser {
    #[serde(rename = "_id", default)]
    underscore_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    mobile_number: Option<String>,
    #[serde(default)]
    isd_code: Option<String>,
    #[serde(default)]
    country_id: Option<String>,
    #[serde(default)]
    isd_code_country_id: Option<String>,
    #[serde(default)]
    role: Option<WireRef>,
    #[serde(default)]
    status: Option<WireStatus>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client: Option<WireRef>,
    #[serde(default)]
    business_unit_id: Option<String>,
    #[serde(default)]
    business_unit: Option<WireRef>,
    #[serde(default)]
    image: Option<WireImage>,
}

/// Merge a flat `<x>Id` field with an embedded `<x>` reference.
///
/// The flat id wins; the embedded name is kept only when it describes the
/// same record.
fn merge_ref<I: From<String>>(flat_id: Option<String>, embedded: Option<WireRef>) -> Option<NamedRef<I>> {
    let flat_id = non_empty(flat_id);
    let (embedded_id, embedded_name) = embedded.map(WireRef::into_parts).unwrap_or((None, None));

    match (flat_id, embedded_id) {
        (Some(flat), Some(emb)) if flat == emb => Some(NamedRef {
            id: I::from(flat),
            name: embedded_name,
        }),
        (Some(flat), _) => Some(NamedRef {
            id: I::from(flat),
            name: None,
        }),
        (None, Some(emb)) => Some(NamedRef {
            id: I::from(emb),
            name: embedded_name,
        }),
        (None, None) => None,
    }
}

impl TryFrom<WireAdminUser> for AdminUser {
    type Error = DomainError;

    fn try_from(w: WireAdminUser) -> DomainResult<Self> {
        let id = UserId::new(pick_id("admin user", w.underscore_id, w.id)?);
        let country_id = non_empty(w.country_id)
            .or(non_empty(w.isd_code_country_id))
            .map(CountryId::new);
        let role = w.role.and_then(|r| {
            let (id, name) = r.into_parts();
            id.map(|id| RoleRef {
                id: RoleId::new(id),
                name,
            })
        });

        Ok(AdminUser {
            id,
            first_name: w.first_name.unwrap_or_default(),
            last_name: w.last_name.unwrap_or_default(),
            email: w.email.unwrap_or_default(),
            mobile_number: w.mobile_number.unwrap_or_default(),
            isd_code: w.isd_code.unwrap_or_default(),
            country_id,
            role,
            status: w.status.map(Status::from).unwrap_or_default(),
            client: merge_ref(w.client_id, w.client),
            business_unit: merge_ref(w.business_unit_id, w.business_unit),
            image: w.image.map(ImageRef::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_accepts_id_or_object() {
        let by_id: AdminUser =
            serde_json::from_value(json!({"_id": "u1", "role": "r1"})).unwrap();
        assert_eq!(
            by_id.role,
            Some(RoleRef {
                id: RoleId::new("r1"),
                name: None
            })
        );

        let by_object: AdminUser = serde_json::from_value(json!({
            "_id": "u1",
            "role": {"_id": "r1", "name": "Super Admin", "permissions": []}
        }))
        .unwrap();
        assert_eq!(by_object.role.unwrap().name.as_deref(), Some("Super Admin"));
    }

    #[test]
    fn status_accepts_code_or_object() {
        let user: AdminUser =
            serde_json::from_value(json!({"_id": "u1", "status": "inactive"})).unwrap();
        assert_eq!(user.status.code, "inactive");
        assert_eq!(user.status.label, "Inactive");

        let user: AdminUser = serde_json::from_value(json!({
            "_id": "u1",
            "status": {"code": "active", "label": "Enabled"}
        }))
        .unwrap();
        assert_eq!(user.status.label, "Enabled");

        let user: AdminUser = serde_json::from_value(json!({"_id": "u1"})).unwrap();
        assert!(user.status.is_active());
    }

    #[test]
    fn image_accepts_file_name_or_object() {
        let user: AdminUser =
            serde_json::from_value(json!({"_id": "u1", "image": "avatar.png"})).unwrap();
        assert_eq!(user.image.unwrap().file_name.as_deref(), Some("avatar.png"));

        let user: AdminUser = serde_json::from_value(json!({
            "_id": "u1",
            "image": {"fileName": "a.jpg", "width": 120, "height": 80, "aspectRatio": "3:2", "mimeType": "image/jpeg"}
        }))
        .unwrap();
        let image = user.image.unwrap();
        assert_eq!(image.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(image.width, Some(120.0));
    }

    #[test]
    fn business_unit_merges_flat_id_and_embedded_object() {
        let user: AdminUser = serde_json::from_value(json!({
            "_id": "u1",
            "businessUnitId": "b",
            "businessUnit": {"_id": "b", "name": "Beta"}
        }))
        .unwrap();
        assert_eq!(user.business_unit_name(&BusinessUnitId::new("b")), Some("Beta"));

        // Embedded object describing another unit: keep the id, drop the name.
        let user: AdminUser = serde_json::from_value(json!({
            "_id": "u1",
            "businessUnitId": "b",
            "businessUnit": {"_id": "z", "name": "Zeta"}
        }))
        .unwrap();
        assert_eq!(user.business_unit_id(), Some(&BusinessUnitId::new("b")));
        assert_eq!(user.business_unit_name(&BusinessUnitId::new("b")), None);

        let user: AdminUser = serde_json::from_value(json!({
            "_id": "u1",
            "businessUnit": {"_id": "b", "name": "Beta"}
        }))
        .unwrap();
        assert_eq!(user.business_unit_id(), Some(&BusinessUnitId::new("b")));
    }

    #[test]
    fn missing_id_is_a_normalization_error() {
        let err = serde_json::from_value::<AdminUser>(json!({"email": "x@y.z"})).unwrap_err();
        assert!(err.to_string().contains("missing _id/id"));
    }

    #[test]
    fn canonical_user_survives_a_serde_round_trip() {
        let user: AdminUser = serde_json::from_value(json!({
            "_id": "u1",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "clientId": "c1",
            "businessUnit": {"_id": "b", "name": "Beta"},
            "role": {"_id": "r1", "name": "Editor"},
            "status": "active"
        }))
        .unwrap();

        let back: AdminUser = serde_json::from_value(serde_json::to_value(&user).unwrap()).unwrap();
        assert_eq!(back, user);
        assert_eq!(back.display_name(), "Ada Lovelace");
    }

    #[test]
    fn client_name_falls_back_to_company_then_placeholder() {
        let person: ClientOption =
            serde_json::from_value(json!({"_id": "c1", "firstName": "Jo", "lastName": " "})).unwrap();
        assert_eq!(person.name, "Jo");

        let company: ClientOption =
            serde_json::from_value(json!({"id": "c2", "companyName": "Acme"})).unwrap();
        assert_eq!(company.id, ClientId::new("c2"));
        assert_eq!(company.name, "Acme");

        let anonymous: ClientOption = serde_json::from_value(json!({"_id": "c3"})).unwrap();
        assert_eq!(anonymous.name, "Client");
    }

    #[test]
    fn role_status_defaults_to_active() {
        let role: Role = serde_json::from_value(json!({"_id": "r1", "name": "Viewer"})).unwrap();
        assert_eq!(role.status, Status::active());
    }

    #[test]
    fn country_search_matches_name_or_isd() {
        let india: Country = serde_json::from_value(json!({
            "_id": "in", "name": "India", "isdCode": "91", "alpha2": "IN"
        }))
        .unwrap();
        assert!(india.matches("ind"));
        assert!(india.matches("9"));
        assert!(!india.matches("fr"));
        assert_eq!(india.flag, "");
        assert_eq!(india.select_value(), "91|in");
    }
}
