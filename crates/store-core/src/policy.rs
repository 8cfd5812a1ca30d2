//! Access Policy
//!
//! The one place that knows who the store administrator is.

use crate::identity::{Identity, normalize_email};

/// Capability checks shared by the entitlement store, guards and admin routes
#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    admin_email: Option<String>,
}

impl AccessPolicy {
    pub fn new(admin_email: Option<&str>) -> Self {
        Self {
            admin_email: admin_email
                .map(normalize_email)
                .filter(|email| !email.is_empty()),
        }
    }

    /// Only authenticated accounts can be admin; a guest claiming the admin
    /// email gets nothing.
    pub fn is_admin(&self, identity: &Identity) -> bool {
        match (&self.admin_email, identity) {
            (Some(admin), Identity::User { email, .. }) => admin == email,
            _ => false,
        }
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_match_is_case_insensitive() {
        let policy = AccessPolicy::new(Some("Owner@Store.io"));
        assert!(policy.is_admin(&Identity::user("u1", "owner@store.io")));
        assert!(!policy.is_admin(&Identity::user("u2", "someone@store.io")));
        assert!(!policy.is_admin(&Identity::guest("owner@store.io")));
    }

    #[test]
    fn test_no_admin_configured() {
        let policy = AccessPolicy::new(None);
        assert!(!policy.is_admin(&Identity::user("u1", "owner@store.io")));
        assert!(!AccessPolicy::new(Some("  ")).is_admin(&Identity::user("u1", "")));
    }
}
