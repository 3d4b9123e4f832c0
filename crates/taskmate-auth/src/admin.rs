//! Admin privilege resolution from a configured email allow-list

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::token::Identity;

/// Trim and lower-case an email for comparison and storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Set of lower-cased admin emails
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAllowList {
    emails: HashSet<String>,
}

impl AdminAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma separated list, ignoring blank entries
    ///
    /// ```
    /// use taskmate_auth::AdminAllowList;
    ///
    /// let list = AdminAllowList::from_csv(" Admin@X.com, ,ops@x.com,");
    /// assert_eq!(list.len(), 2);
    /// assert!(list.contains("admin@x.com"));
    /// ```
    pub fn from_csv(csv: &str) -> Self {
        csv.split(',').collect()
    }

    pub fn insert(&mut self, email: &str) {
        let email = normalize_email(email);
        if !email.is_empty() {
            self.emails.insert(email);
        }
    }

    /// Case-insensitive membership test
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&email.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.emails.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> Extend<S> for AdminAllowList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for email in iter {
            self.insert(email.as_ref());
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for AdminAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

/// Decides whether a verified identity holds admin privilege
#[derive(Clone)]
pub struct AdminResolver {
    config: Arc<AuthConfig>,
}

impl AdminResolver {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        Self { config }
    }

    pub fn is_admin(&self, identity: &Identity) -> bool {
        self.is_admin_email(&identity.email)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.config.admin_emails().contains(email)
    }

    /// Gate for admin-only operations
    pub fn require_admin(&self, identity: &Identity) -> Result<(), AuthError> {
        if self.is_admin(identity) {
            Ok(())
        } else {
            debug!(subject_id = identity.subject_id, "Admin access denied");
            Err(AuthError::ForbiddenNotAdmin)
        }
    }
}
