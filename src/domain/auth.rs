use serde::{Deserialize, Serialize};

use crate::domain::types::{TypeConstraintError, UserId};
use crate::domain::user::{User, UserRole};

/// Role granted to every signed-in account.
pub const ROLE_USER: &str = "user";
/// Role granted to platform operators.
pub const ROLE_SUPER_ADMIN: &str = "super_admin";

/// Identity carried in the session cookie as signed JWT claims.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    pub exp: usize,
}

impl AuthenticatedUser {
    pub fn from_user(user: &User, exp: usize) -> Self {
        let mut roles = vec![ROLE_USER.to_string()];
        if user.role == UserRole::SuperAdmin {
            roles.push(ROLE_SUPER_ADMIN.to_string());
        }
        Self {
            sub: user.id.to_string(),
            email: user.email.to_string(),
            name: user.full_name(),
            roles,
            exp,
        }
    }

    /// Owner id of everything this user creates.
    pub fn user_id(&self) -> Result<UserId, TypeConstraintError> {
        let raw = self
            .sub
            .parse::<i32>()
            .map_err(|_| TypeConstraintError::NonPositiveId)?;
        UserId::new(raw)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(ROLE_SUPER_ADMIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::tests::sample_user;

    #[test]
    fn super_admin_gets_both_roles() {
        let claims = AuthenticatedUser::from_user(&sample_user(UserRole::SuperAdmin), 10);
        assert!(claims.has_role(ROLE_USER));
        assert!(claims.is_super_admin());
        assert_eq!(claims.user_id().unwrap().get(), 1);
    }

    #[test]
    fn invalid_subject_is_rejected() {
        let mut claims = AuthenticatedUser::from_user(&sample_user(UserRole::Client), 10);
        claims.sub = "abc".into();
        assert!(claims.user_id().is_err());
        assert!(!claims.is_super_admin());
    }
}
