//! Normalized auth payload
//!
//! Every strategy produces one of these after a successful handshake.
//! The uid is normalized to a string whether the provider sent a
//! number or a string.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Data handed to the callback after a successful external login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Provider name, e.g. "github"
    pub provider: String,
    /// External user id
    #[serde(deserialize_with = "deserialize_uid")]
    pub uid: String,
    pub info: AuthInfo,
    /// Carried for completeness; never persisted
    #[serde(default)]
    pub credentials: Option<AuthCredentials>,
    /// Raw provider response
    #[serde(default)]
    pub extra: Option<serde_json::Value>,
}

/// Profile information reported by the provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl AuthInfo {
    /// Name to file the user under: `name` if non-blank, else `email`.
    pub fn display_name(&self) -> Option<&str> {
        non_blank(self.name.as_deref()).or_else(|| non_blank(self.email.as_deref()))
    }
}

/// Access token details from the provider
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthCredentials {
    pub token: String,
    #[serde(default)]
    pub expires: bool,
    /// Unix timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("token", &"[redacted]")
            .field("expires", &self.expires)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn deserialize_uid<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Uid {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Uid::deserialize(deserializer)? {
        Uid::Text(text) => text,
        Uid::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_uid_is_normalized_to_string() {
        let payload: AuthPayload = serde_json::from_value(serde_json::json!({
            "provider": "github",
            "uid": 42,
            "info": { "name": "Ada" }
        }))
        .unwrap();

        assert_eq!(payload.uid, "42");
        assert!(payload.credentials.is_none());
    }

    #[test]
    fn missing_info_is_rejected() {
        let result = serde_json::from_value::<AuthPayload>(serde_json::json!({
            "provider": "github",
            "uid": "42"
        }));

        assert!(result.is_err());
    }

    #[test]
    fn display_name_prefers_name_over_email() {
        let info = AuthInfo {
            name: Some("Ada".to_string()),
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };
        assert_eq!(info.display_name(), Some("Ada"));

        let info = AuthInfo {
            name: Some("   ".to_string()),
            email: Some("a@x.com".to_string()),
            ..Default::default()
        };
        assert_eq!(info.display_name(), Some("a@x.com"));

        assert_eq!(AuthInfo::default().display_name(), None);
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let credentials = AuthCredentials {
            token: "gho_secret".to_string(),
            expires: false,
            expires_at: None,
        };

        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("gho_secret"));
        assert!(rendered.contains("[redacted]"));
    }
}
