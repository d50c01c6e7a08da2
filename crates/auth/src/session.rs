//! Signed-in session model.

use serde::Serialize;

use console_core::{AdminUser, ImageRef, RoleRef, UserId};

/// The signed-in admin as the console shows it (top bar, profile menu).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub display_name: String,
    pub email: String,
    pub role: Option<RoleRef>,
    pub avatar: Option<ImageRef>,
}

impl Session {
    /// Map the current-user record to a session.
    pub fn from_user(user: &AdminUser) -> Self {
        Self {
            user_id: user.id.clone(),
            display_name: user.display_name(),
            email: user.email.clone(),
            role: user.role.clone(),
            avatar: user.image.clone(),
        }
    }
}

/// Session lifecycle.
///
/// `Bootstrapping` → {`Authenticated`, `Unauthenticated`}; `Loading` is the
/// transient state while a login is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Bootstrapping,
    Loading,
    Authenticated(Session),
    Unauthenticated,
}

impl SessionStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionStatus::Authenticated(_))
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionStatus::Authenticated(_) | SessionStatus::Unauthenticated
        )
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionStatus::Authenticated(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Bootstrapping => "bootstrapping",
            SessionStatus::Loading => "loading",
            SessionStatus::Authenticated(_) => "authenticated",
            SessionStatus::Unauthenticated => "unauthenticated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_maps_current_user() {
        let user: AdminUser = serde_json::from_value(json!({
            "_id": "64f0",
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "grace@example.com",
            "role": "super-admin",
            "image": {"fileName": "g.png", "mimeType": "image/png"}
        }))
        .unwrap();

        let session = Session::from_user(&user);
        assert_eq!(session.user_id, UserId::new("64f0"));
        assert_eq!(session.display_name, "Grace Hopper");
        assert_eq!(session.role.unwrap().id.as_str(), "super-admin");
        assert_eq!(session.avatar.unwrap().file_name.as_deref(), Some("g.png"));
    }

    #[test]
    fn display_name_tolerates_missing_last_name() {
        let user: AdminUser =
            serde_json::from_value(json!({"_id": "1", "firstName": "Linus"})).unwrap();
        assert_eq!(Session::from_user(&user).display_name, "Linus");
    }

    #[test]
    fn status_predicates() {
        assert!(!SessionStatus::Bootstrapping.is_settled());
        assert!(!SessionStatus::Loading.is_settled());
        assert!(SessionStatus::Unauthenticated.is_settled());
        assert_eq!(SessionStatus::Unauthenticated.session(), None);
    }
}
