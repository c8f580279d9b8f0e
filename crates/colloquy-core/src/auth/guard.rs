//! Role guard.

use colloquy_types::error::ServiceError;
use colloquy_types::identity::Identity;

/// Admit `identity` if `required_roles` is empty or shares a role with it.
pub fn authorize<S: AsRef<str>>(identity: &Identity, required_roles: &[S]) -> Result<(), ServiceError> {
    if required_roles.is_empty()
        || required_roles.iter().any(|role| identity.has_role(role.as_ref()))
    {
        return Ok(());
    }
    tracing::debug!(email = %identity.email, "caller lacks every required role");
    Err(ServiceError::forbidden(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use colloquy_types::error::ErrorKind;

    fn identity(roles: &[&str]) -> Identity {
        Identity {
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_requirement_passes() {
        let none: [&str; 0] = [];
        assert!(authorize(&identity(&[]), &none).is_ok());
    }

    #[test]
    fn test_intersection_passes() {
        assert!(authorize(&identity(&["user", "admin"]), &["admin", "auditor"]).is_ok());
    }

    #[test]
    fn test_disjoint_roles_fail_closed() {
        let err = authorize(&identity(&["user"]), &["admin"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);

        let err = authorize(&identity(&[]), &["admin"]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }
}
