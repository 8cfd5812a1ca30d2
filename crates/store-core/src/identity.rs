//! Buyer identities

use serde::{Deserialize, Serialize};

/// Who is acting: an authenticated account or a guest known only by email
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Identity {
    User { user_id: String, email: String },
    Guest { email: String },
}

impl Identity {
    pub fn user(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Identity::User {
            user_id: user_id.into(),
            email: normalize_email(&email.into()),
        }
    }

    pub fn guest(email: impl Into<String>) -> Self {
        Identity::Guest {
            email: normalize_email(&email.into()),
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Identity::User { email, .. } | Identity::Guest { email } => email,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::User { user_id, .. } => Some(user_id),
            Identity::Guest { .. } => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User { .. })
    }

    /// Whether purchases owned by `owner` belong to this identity.
    ///
    /// An account also claims guest orders placed with its email.
    pub fn claims(&self, owner: &Identity) -> bool {
        match (self, owner) {
            (Identity::User { user_id, .. }, Identity::User { user_id: owner_id, .. }) => {
                user_id == owner_id
            }
            (_, Identity::Guest { email: owner_email }) => self.email() == owner_email,
            (Identity::Guest { .. }, Identity::User { .. }) => false,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::User { user_id, .. } => write!(f, "user:{}", user_id),
            Identity::Guest { email } => write!(f, "guest:{}", email),
        }
    }
}

/// Lowercase and trim an email so comparisons are stable
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalized() {
        let id = Identity::user("u1", "  Chris@Example.COM ");
        assert_eq!(id.email(), "chris@example.com");
        assert_eq!(id.user_id(), Some("u1"));
        assert!(!Identity::guest("a@b.c").is_authenticated());
    }

    #[test]
    fn test_claims() {
        let user = Identity::user("u1", "u1@x.io");
        assert!(user.claims(&Identity::user("u1", "old@x.io")));
        assert!(user.claims(&Identity::guest("U1@x.io")));
        assert!(!user.claims(&Identity::user("u2", "u1@x.io")));

        let guest = Identity::guest("g@x.io");
        assert!(guest.claims(&Identity::guest("g@x.io")));
        assert!(!guest.claims(&Identity::user("u9", "g@x.io")));
    }
}
