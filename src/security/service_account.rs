use std::fmt;

use crate::config::GoogleConfig;

/// Service-account credential used to mint directory API tokens.
///
/// Loaded once per process and never mutated. The key is taken as already
/// normalized by config loading.
#[derive(Clone)]
pub struct ServiceAccountCredential {
    pub client_email: String,
    /// PEM encoded PKCS8 RSA private key.
    pub private_key: String,
    /// User to impersonate through domain-wide delegation.
    pub subject: Option<String>,
    /// Process-wide scope override. Empty means "use what each call asks for".
    pub scopes: Vec<String>,
}

impl ServiceAccountCredential {
    pub fn from_config(google: &GoogleConfig) -> Self {
        Self {
            client_email: google.client_email.clone(),
            private_key: google.private_key.clone(),
            subject: google.subject.clone().filter(|s| !s.trim().is_empty()),
            scopes: google.scopes.clone(),
        }
    }
}

impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("subject", &self.subject)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Keys pasted into env files usually carry literal `\n` escapes.
pub fn normalize_private_key(raw: &str) -> String {
    raw.trim().replace("\\r\\n", "\n").replace("\\n", "\n").replace("\r\n", "\n")
}
