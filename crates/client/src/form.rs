//! Create/edit admin-user form.
//!
//! Holds the editable fields, drives the client → business-unit cascade and
//! turns the form into the multipart body the backend expects.

use std::sync::{Arc, RwLock};

use console_core::{
    AdminUser, BusinessUnitId, BusinessUnitOption, ClientId, Country, CountryId, DomainError, RoleId, UserId,
};

use crate::cascade::{BusinessUnitLookup, resolve_business_unit_options};
use crate::error::ClientError;
use crate::http::MultipartForm;
use crate::reference::ReferenceDataCache;
use crate::users::{MutationOutcome, UserDirectory};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit(UserId),
}

/// Image attached to the form for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Contact values as loaded, for the changed/unchanged encoding on edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginalValues {
    pub email: String,
    pub isd_code: String,
    pub country_id: Option<CountryId>,
    pub mobile_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub mobile_number: String,
    pub isd_code: String,
    pub country_id: Option<CountryId>,
    pub role_id: Option<RoleId>,
    pub status: String,
    pub client_id: Option<ClientId>,
    pub business_unit_id: Option<BusinessUnitId>,
    pub image: Option<ImageUpload>,
    pub original: OriginalValues,
}

impl Default for UserForm {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            password: String::new(),
            mobile_number: String::new(),
            isd_code: String::new(),
            country_id: None,
            role_id: None,
            status: "active".to_string(),
            client_id: None,
            business_unit_id: None,
            image: None,
            original: OriginalValues::default(),
        }
    }
}

impl UserForm {
    /// Populate an edit form from a loaded user.
    pub fn from_user(user: &AdminUser) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            password: String::new(),
            mobile_number: user.mobile_number.clone(),
            isd_code: user.isd_code.clone(),
            country_id: user.country_id.clone(),
            role_id: user.role.as_ref().map(|r| r.id.clone()),
            status: user.status.code.clone(),
            client_id: user.client_id().cloned(),
            business_unit_id: user.business_unit_id().cloned(),
            image: None,
            original: OriginalValues {
                email: user.email.clone(),
                isd_code: user.isd_code.clone(),
                country_id: user.country_id.clone(),
                mobile_number: user.mobile_number.clone(),
            },
        }
    }

    /// Apply a combined country select value `"<isd>|<countryId>"`.
    pub fn set_country(&mut self, value: &str) -> Result<(), DomainError> {
        let (isd, country) = value
            .split_once('|')
            .ok_or_else(|| DomainError::validation(format!("country select value '{value}' is not '<isd>|<id>'")))?;
        let country_id: CountryId = country.parse()?;
        self.isd_code = isd.trim().to_string();
        self.country_id = Some(country_id);
        Ok(())
    }

    /// Multipart body for the add endpoint.
    pub fn create_submission(&self) -> MultipartForm {
        let mut form = MultipartForm::new();
        let country_id = id_or_empty(self.country_id.as_ref());
        form.add_text("firstName", &self.first_name);
        form.add_text("lastName", &self.last_name);
        form.add_text("email", &self.email);
        form.add_text("password", &self.password);
        form.add_text("isdCode", strip_plus(&self.isd_code));
        form.add_text("countryId", &country_id);
        form.add_text("isdCodeCountryId", &country_id);
        form.add_text("mobileNumber", &self.mobile_number);
        form.add_text("clientId", id_or_empty(self.client_id.as_ref()));
        form.add_text("businessUnitId", id_or_empty(self.business_unit_id.as_ref()));
        form.add_text("roleId", id_or_empty(self.role_id.as_ref()));
        form.add_text("status", &self.status);
        self.attach_image(&mut form);
        form
    }

    /// Multipart body for the edit endpoint.
    ///
    /// A changed contact field is sent as the original value under its plain
    /// name and the new value under `new<Field>`.
    pub fn edit_submission(&self, id: &UserId) -> MultipartForm {
        let mut form = MultipartForm::new();
        form.add_text("id", id.as_str());

        push_diff(&mut form, "email", "newEmail", &self.original.email, &self.email);
        push_diff(
            &mut form,
            "isdCode",
            "newIsdCode",
            strip_plus(&self.original.isd_code),
            strip_plus(&self.isd_code),
        );
        push_diff(
            &mut form,
            "countryId",
            "newCountryId",
            &id_or_empty(self.original.country_id.as_ref()),
            &id_or_empty(self.country_id.as_ref()),
        );
        push_diff(
            &mut form,
            "mobileNumber",
            "newMobileNumber",
            &self.original.mobile_number,
            &self.mobile_number,
        );

        form.add_text("firstName", &self.first_name);
        form.add_text("lastName", &self.last_name);
        if !self.password.is_empty() {
            form.add_text("password", &self.password);
        }
        form.add_text("clientId", id_or_empty(self.client_id.as_ref()));
        form.add_text("businessUnitId", id_or_empty(self.business_unit_id.as_ref()));
        form.add_text("role", id_or_empty(self.role_id.as_ref()));
        form.add_text("status", &self.status);
        self.attach_image(&mut form);
        form
    }

    fn attach_image(&self, form: &mut MultipartForm) {
        if let Some(image) = &self.image {
            form.add_file("image", &image.file_name, image.mime_type.clone(), image.bytes.clone());
        }
    }
}

fn push_diff(form: &mut MultipartForm, name: &str, new_name: &str, original: &str, current: &str) {
    if original == current {
        form.add_text(name, current);
    } else {
        form.add_text(name, original);
        form.add_text(new_name, current);
    }
}

fn strip_plus(isd: &str) -> &str {
    isd.strip_prefix('+').unwrap_or(isd)
}

fn id_or_empty<I: AsRef<str>>(id: Option<&I>) -> String {
    id.map(|i| i.as_ref().to_string()).unwrap_or_default()
}

/// A live create or edit form bound to the shared caches.
#[derive(Debug)]
pub struct FormOrchestrator {
    mode: FormMode,
    reference: Arc<ReferenceDataCache>,
    users: Arc<UserDirectory>,
    form: RwLock<UserForm>,
}

impl FormOrchestrator {
    pub fn new(mode: FormMode, reference: Arc<ReferenceDataCache>, users: Arc<UserDirectory>) -> Self {
        Self {
            mode,
            reference,
            users,
            form: RwLock::new(UserForm::default()),
        }
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn form(&self) -> UserForm {
        self.form.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Edit plain fields (names, email, password, mobile, status, image).
    pub fn update(&self, f: impl FnOnce(&mut UserForm)) {
        let mut form = self.form.write().unwrap_or_else(|e| e.into_inner());
        f(&mut form);
    }

    /// Load reference lists and, in edit mode, the user being edited.
    ///
    /// Reference-list failures are recorded in the cache and logged; only a
    /// failure to load the edited user is returned.
    pub async fn initialize(&self) -> Result<(), ClientError> {
        let (countries, clients, roles) =
            tokio::join!(self.reference.countries(), self.reference.clients(), self.reference.roles());
        for (kind, result) in [
            ("countries", countries.map(|_| ())),
            ("clients", clients.map(|_| ())),
            ("roles", roles.map(|_| ())),
        ] {
            if let Err(err) = result {
                tracing::warn!(kind, error = %err, "form opened without reference list");
            }
        }

        let FormMode::Edit(id) = &self.mode else {
            return Ok(());
        };

        let user = self.users.fetch_by_id(id).await?;
        let form = UserForm::from_user(&user);
        let client_id = form.client_id.clone();
        self.update(|f| *f = form);

        if let Some(client_id) = client_id {
            if let Err(err) = self.reference.fetch_business_units(&client_id).await {
                tracing::warn!(client_id = %client_id, error = %err, "business units unavailable for edited user");
            }
        }
        Ok(())
    }

    /// Change the client; clears the business unit and re-fetches units.
    ///
    /// The form is only written before the fetch, so a response arriving
    /// after another client was picked updates the cache but not the form.
    pub async fn select_client(&self, client_id: Option<ClientId>) -> Result<(), ClientError> {
        let client_id = client_id.filter(|id| !id.is_empty());
        self.update(|f| {
            f.client_id = client_id.clone();
            f.business_unit_id = None;
        });

        match client_id {
            Some(id) => self.reference.fetch_business_units(&id).await.map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn select_business_unit(&self, id: Option<BusinessUnitId>) {
        self.update(|f| f.business_unit_id = id.filter(|id| !id.is_empty()));
    }

    pub fn select_role(&self, id: Option<RoleId>) {
        self.update(|f| f.role_id = id.filter(|id| !id.is_empty()));
    }

    /// Apply a country select value `"<isd>|<countryId>"`.
    pub fn select_country(&self, value: &str) -> Result<(), DomainError> {
        let mut form = self.form();
        form.set_country(value)?;
        self.update(|f| {
            f.isd_code = form.isd_code;
            f.country_id = form.country_id;
        });
        Ok(())
    }

    /// The cached country matching the form's country id and ISD code.
    pub fn selected_country(&self) -> Option<Country> {
        let form = self.form();
        let country_id = form.country_id.as_ref()?;
        self.reference
            .find_country(Some(country_id), &form.isd_code)
            .filter(|c| strip_plus(&c.isd_code) == strip_plus(&form.isd_code))
    }

    pub fn country_options(&self, search: &str) -> Vec<Country> {
        self.reference.filter_countries(search)
    }

    /// Business units to offer for the selected client, with the form's
    /// current unit injected when the cached list lacks it.
    pub fn business_unit_options(&self) -> Vec<BusinessUnitOption> {
        let form = self.form();
        let cache = self.reference.business_unit_cache();
        let selected_user = self.users.selected();
        let bulk_users = self.users.users();

        let cached = form
            .client_id
            .as_ref()
            .and_then(|id| cache.get(id))
            .cloned()
            .unwrap_or_default();
        let lookup = BusinessUnitLookup {
            selected_user: selected_user.as_ref(),
            bulk_users: &bulk_users,
            cached_by_client: &cache,
        };

        resolve_business_unit_options(form.business_unit_id.as_ref(), &cached, &lookup)
    }

    /// Submit to the add or edit endpoint.
    pub async fn submit(&self) -> MutationOutcome {
        let form = self.form();
        match &self.mode {
            FormMode::Create => self.users.add(form.create_submission()).await,
            FormMode::Edit(id) => self.users.update(id, form.edit_submission(id)).await,
        }
    }
}
