//! Credential value types.

use serde::{Deserialize, Serialize};

/// Name of the session cookie issued by the site.
pub const SESSION_COOKIE: &str = "_ksr_session";

/// Header carrying the anti-forgery token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Session token and CSRF token. Either may be absent before the first refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPair {
    pub session_token: Option<String>,
    pub csrf_token: Option<String>,
}

impl CredentialPair {
    pub fn new(session_token: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            session_token: Some(session_token.into()),
            csrf_token: Some(csrf_token.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref().filter(|s| !s.is_empty())
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref().filter(|s| !s.is_empty())
    }

    /// Both halves present and non-empty.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.session_token().is_some() && self.csrf_token().is_some()
    }
}

/// On-disk layout of the cookie file: `{"_ksr_session": "..."}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct CookieFile {
    #[serde(rename = "_ksr_session", default)]
    pub session: Option<String>,
}

/// On-disk layout of the header file: `{"X-CSRF-Token": "..."}`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct HeaderFile {
    #[serde(rename = "X-CSRF-Token", default)]
    pub csrf: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values_are_not_complete() {
        assert!(!CredentialPair::empty().is_complete());
        assert!(!CredentialPair::new("", "token").is_complete());
        assert!(!CredentialPair::new("session", "").is_complete());
        assert!(CredentialPair::new("session", "token").is_complete());
    }

    #[test]
    fn test_file_layouts_use_wire_names() {
        let cookie = serde_json::to_value(CookieFile {
            session: Some("abc".into()),
        })
        .unwrap();
        assert_eq!(cookie["_ksr_session"], "abc");

        let header: HeaderFile = serde_json::from_str(r#"{"X-CSRF-Token":"xyz"}"#).unwrap();
        assert_eq!(header.csrf.as_deref(), Some("xyz"));
    }
}
