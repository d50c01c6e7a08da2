//! REST routes of the admin backend.

use console_core::{ClientId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn login(&self) -> String {
        self.url("/admin/login")
    }

    pub fn refresh_token(&self) -> String {
        self.url("/admin/refreshToken")
    }

    pub fn me(&self) -> String {
        self.url("/admin/me")
    }

    pub fn users(&self) -> String {
        self.url("/admin/list")
    }

    pub fn user(&self, id: &UserId) -> String {
        self.url(&format!("/admin/{id}"))
    }

    pub fn add_user(&self) -> String {
        self.url("/admin/add")
    }

    pub fn edit_user(&self) -> String {
        self.url("/admin/edit")
    }

    pub fn delete_user(&self) -> String {
        self.url("/admin/delete")
    }

    pub fn countries(&self) -> String {
        self.url("/location/countries/list")
    }

    pub fn active_clients(&self) -> String {
        self.url("/client/getActive")
    }

    pub fn client(&self, id: &ClientId) -> String {
        self.url(&format!("/client/{id}"))
    }

    pub fn business_units(&self, client_id: &ClientId) -> String {
        self.url(&format!("/business/getByClientForDropdown/{client_id}"))
    }

    pub fn roles(&self) -> String {
        self.url("/role/list?page=1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_join_onto_the_base() {
        let endpoints = Endpoints::new("http://localhost:3000/api/");
        assert_eq!(endpoints.login(), "http://localhost:3000/api/admin/login");
        assert_eq!(
            endpoints.business_units(&ClientId::new("c1")),
            "http://localhost:3000/api/business/getByClientForDropdown/c1"
        );
        assert_eq!(endpoints.roles(), "http://localhost:3000/api/role/list?page=1");
    }
}
