//! Impersonation identity for launched processes.

use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;

/// Identity a process is launched as.
///
/// The secret is moved into a [`SecretString`] the moment the credential is
/// built. It is zeroized on drop, redacted from `Debug`, and there is no
/// accessor that returns it as plaintext. On Unix the launch switches to the
/// user's uid/gid and never reads the secret.
#[derive(Clone)]
pub struct SecureCredential {
    domain: Option<String>,
    username: String,
    #[allow(dead_code)]
    secret: Arc<SecretString>,
}

impl SecureCredential {
    /// Build a credential from its parts.
    ///
    /// Returns `None` unless both username and secret are non-empty: a
    /// partial credential means "launch as the supervisor's own user".
    /// An empty domain is treated as no domain.
    pub fn from_parts(
        domain: Option<&str>,
        username: Option<&str>,
        secret: Option<String>,
    ) -> Option<Self> {
        let username = username.map(str::trim).filter(|u| !u.is_empty())?;
        let secret = secret.filter(|s| !s.is_empty())?;
        let domain = domain
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Some(Self {
            domain,
            username: username.to_string(),
            secret: Arc::new(SecretString::from(secret)),
        })
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `DOMAIN\user` when a domain is present, otherwise the bare username.
    pub fn qualified_username(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}\\{}", domain, self.username),
            None => self.username.clone(),
        }
    }
}

impl fmt::Debug for SecureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureCredential")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_credentials_are_ignored() {
        assert!(SecureCredential::from_parts(None, Some("svc"), None).is_none());
        assert!(SecureCredential::from_parts(None, Some("svc"), Some(String::new())).is_none());
        assert!(SecureCredential::from_parts(None, None, Some("pw".into())).is_none());
        assert!(SecureCredential::from_parts(None, Some("  "), Some("pw".into())).is_none());
    }

    #[test]
    fn test_complete_credential() {
        let cred =
            SecureCredential::from_parts(Some("CORP"), Some("svc"), Some("hunter2".into())).unwrap();
        assert_eq!(cred.domain(), Some("CORP"));
        assert_eq!(cred.username(), "svc");
        assert_eq!(cred.qualified_username(), "CORP\\svc");

        let cred = SecureCredential::from_parts(Some(""), Some("svc"), Some("pw".into())).unwrap();
        assert_eq!(cred.domain(), None);
        assert_eq!(cred.qualified_username(), "svc");
    }

    #[test]
    fn test_debug_never_shows_secret() {
        let cred =
            SecureCredential::from_parts(None, Some("svc"), Some("hunter2".into())).unwrap();
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
    }
}
