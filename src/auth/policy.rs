//! Resolution of the account a request acts on.

use super::Identity;
use crate::api::error::ApiError;

/// How a handler picks the account whose resources it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectPolicy {
    /// Admins must name the target in the route; everyone else acts on themselves.
    AdminOverride,
    /// The route parameter wins when present, otherwise the caller.
    SelfOrPublic,
}

impl SubjectPolicy {
    pub fn resolve(self, identity: &Identity, param: Option<&str>) -> Result<String, ApiError> {
        let param = param.map(str::trim).filter(|p| !p.is_empty());
        match self {
            SubjectPolicy::AdminOverride if identity.is_admin() => param
                .map(str::to_string)
                .ok_or_else(|| ApiError::validation("Missing parameter: ID is required")),
            SubjectPolicy::AdminOverride => Ok(identity.id.clone()),
            SubjectPolicy::SelfOrPublic => Ok(param.unwrap_or(&identity.id).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Role;
    use axum::http::StatusCode;

    fn identity(id: &str, role: Role) -> Identity {
        Identity {
            id: id.to_string(),
            name: "n".to_string(),
            email: "e@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_admin_override_uses_route_param() {
        let admin = identity("admin1", Role::Admin);
        assert_eq!(
            SubjectPolicy::AdminOverride
                .resolve(&admin, Some("company42"))
                .unwrap(),
            "company42"
        );
    }

    #[test]
    fn test_admin_override_requires_param_for_admins() {
        let admin = identity("admin1", Role::Admin);
        let err = SubjectPolicy::AdminOverride.resolve(&admin, None).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = SubjectPolicy::AdminOverride
            .resolve(&admin, Some("  "))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_admin_override_ignores_param_for_others() {
        let company = identity("co7", Role::Co);
        assert_eq!(
            SubjectPolicy::AdminOverride
                .resolve(&company, Some("company42"))
                .unwrap(),
            "co7"
        );
        assert_eq!(
            SubjectPolicy::AdminOverride.resolve(&company, None).unwrap(),
            "co7"
        );
    }

    #[test]
    fn test_self_or_public() {
        let visitor = identity("v1", Role::Visitor);
        assert_eq!(
            SubjectPolicy::SelfOrPublic
                .resolve(&visitor, Some("company42"))
                .unwrap(),
            "company42"
        );
        assert_eq!(
            SubjectPolicy::SelfOrPublic.resolve(&visitor, None).unwrap(),
            "v1"
        );
        assert_eq!(
            SubjectPolicy::SelfOrPublic.resolve(&visitor, Some("")).unwrap(),
            "v1"
        );
    }
}
