//! User and logo models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::Stored;

/// Account role. `User` is the fallback for tokens that carry no role; it is never registrable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    /// Company account
    Co,
    Visitor,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Co => "co",
            Role::Visitor => "visitor",
            Role::User => "user",
        }
    }

    /// Parse a role that may be assigned to an account.
    pub fn registrable(value: &str) -> Option<Role> {
        match value {
            "admin" => Some(Role::Admin),
            "co" => Some(Role::Co),
            "visitor" => Some(Role::Visitor),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub design_complete: bool,
    #[serde(default)]
    pub information_complete: bool,
    /// Company tax id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cif: Option<String>,
    /// Id of the logo document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Visitor national id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub studies: Option<String>,
    /// Profile image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Partial user update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Public view of a user: no password hash, logo resolved to a URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub design_complete: bool,
    pub information_complete: bool,
    pub logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cif: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dni: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub studies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UserView {
    pub fn new(user: Stored<UserRecord>, logo_url: Option<String>) -> Self {
        let Stored { id, data } = user;
        Self {
            id,
            name: data.name,
            email: data.email,
            role: data.role,
            created_at: data.created_at,
            design_complete: data.design_complete,
            information_complete: data.information_complete,
            logo: logo_url,
            cif: data.cif,
            dni: data.dni,
            subname: data.subname,
            studies: data.studies,
            image: data.image,
            cv: data.cv,
            phone: data.phone,
        }
    }
}

/// Minimal identity returned by login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub name_or_email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub cif: Option<String>,
    pub dni: Option<String>,
    pub subname: Option<String>,
    pub studies: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoRecord {
    /// Owning user; unset only between upload and account creation
    pub company_id: Option<String>,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_wire_names() {
        assert_eq!(serde_json::to_value(Role::Co).unwrap(), json!("co"));
        assert_eq!(
            serde_json::from_value::<Role>(json!("visitor")).unwrap(),
            Role::Visitor
        );
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn test_registrable_roles() {
        assert_eq!(Role::registrable("admin"), Some(Role::Admin));
        assert_eq!(Role::registrable("co"), Some(Role::Co));
        assert_eq!(Role::registrable("visitor"), Some(Role::Visitor));
        assert_eq!(Role::registrable("user"), None);
        assert_eq!(Role::registrable("Admin"), None);
    }

    #[test]
    fn test_user_record_defaults_flags() {
        let record: UserRecord = serde_json::from_value(json!({
            "name": "Acme",
            "email": "acme@example.com",
            "passwordHash": "x",
            "role": "co",
            "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(!record.design_complete);
        assert!(!record.information_complete);
        assert!(record.cif.is_none());
    }

    #[test]
    fn test_view_hides_password_hash() {
        let record: UserRecord = serde_json::from_value(json!({
            "name": "Acme",
            "email": "acme@example.com",
            "passwordHash": "secret-hash",
            "role": "co",
            "createdAt": "2024-01-01T00:00:00Z",
            "logo": "logo-doc"
        }))
        .unwrap();
        let view = UserView::new(
            Stored {
                id: "u1".into(),
                data: record,
            },
            Some("https://drive.google.com/uc?id=abc".into()),
        );
        let value = serde_json::to_value(&view).unwrap();
        assert!(value.get("passwordHash").is_none());
        assert_eq!(value["id"], "u1");
        assert_eq!(value["logo"], "https://drive.google.com/uc?id=abc");
    }

    #[test]
    fn test_patch_skips_absent_fields() {
        let patch = UserPatch {
            design_complete: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"designComplete": true})
        );
    }
}
