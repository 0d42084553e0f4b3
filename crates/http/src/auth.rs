//! Credentials for the Sheets API.

use chrono::{DateTime, Duration, Utc};
use gridkv_core::{KvError, KvResult};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Token endpoint used when an authorized user file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed ahead of time.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Opaque bearer token attached to every API request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Wrap an access token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Supplies a valid credential on demand. Called once per API request.
pub trait CredentialProvider: Send + Sync {
    fn credential(&self) -> KvResult<Credential>;
}

/// A fixed, already-issued access token.
#[derive(Debug, Clone)]
pub struct StaticToken(Credential);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Credential::bearer(token))
    }
}

impl CredentialProvider for StaticToken {
    fn credential(&self) -> KvResult<Credential> {
        Ok(self.0.clone())
    }
}

/// Contents of an OAuth "authorized user" token file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthorizedUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    refresh_token: String,
    client_id: String,
    client_secret: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
    /// Fields we do not interpret (scopes, account, ...) are written back as-is.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl AuthorizedUser {
    fn cached_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref()?;
        match self.expiry {
            Some(expiry) if expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now => None,
            _ => Some(token),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Token file that is refreshed with its refresh token when it expires.
///
/// The refreshed access token and expiry are written back to the file so
/// the next process can reuse them.
pub struct AuthorizedUserFile {
    path: PathBuf,
    client: Client,
    user: Mutex<AuthorizedUser>,
}

impl fmt::Debug for AuthorizedUserFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUserFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl AuthorizedUserFile {
    /// Load the token file at `path`.
    pub fn load(path: impl AsRef<Path>) -> KvResult<Self> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path)?;
        let user: AuthorizedUser = serde_json::from_str(&text)?;
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| KvError::backend(e.to_string()))?;

        Ok(Self {
            path,
            client,
            user: Mutex::new(user),
        })
    }

    /// Path of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&self, user: &mut AuthorizedUser) -> KvResult<Credential> {
        debug!(token_uri = %user.token_uri, "refreshing access token");
        let response = self
            .client
            .post(&user.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", user.refresh_token.as_str()),
                ("client_id", user.client_id.as_str()),
                ("client_secret", user.client_secret.as_str()),
            ])
            .send()
            .map_err(|e| KvError::backend(format!("Token refresh failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(KvError::backend(format!(
                "Token refresh failed: HTTP {status} - {body}"
            )));
        }
        let refreshed: TokenResponse = response
            .json()
            .map_err(|e| KvError::backend(format!("Failed to parse token response: {e}")))?;

        user.token = Some(refreshed.access_token);
        user.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));
        std::fs::write(&self.path, serde_json::to_string_pretty(user)?)?;
        info!(path = %self.path.display(), "stored refreshed access token");

        Ok(Credential::bearer(user.token.clone().unwrap_or_default()))
    }
}

impl CredentialProvider for AuthorizedUserFile {
    fn credential(&self) -> KvResult<Credential> {
        let mut user = self.user.lock();
        if let Some(token) = user.cached_token(Utc::now()) {
            return Ok(Credential::bearer(token));
        }
        self.refresh(&mut user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(token: Option<&str>, expiry: Option<DateTime<Utc>>) -> AuthorizedUser {
        AuthorizedUser {
            token: token.map(str::to_string),
            refresh_token: "r".to_string(),
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            token_uri: default_token_uri(),
            expiry,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let credential = Credential::bearer("secret-token");
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.token(), "secret-token");
    }

    #[test]
    fn test_static_token() {
        let provider = StaticToken::new("abc");
        assert_eq!(provider.credential().unwrap().token(), "abc");
    }

    #[test]
    fn test_cached_token_validity() {
        let now = Utc::now();
        assert_eq!(user(None, None).cached_token(now), None);
        assert_eq!(user(Some("t"), None).cached_token(now), Some("t"));
        assert_eq!(
            user(Some("t"), Some(now + Duration::hours(1))).cached_token(now),
            Some("t")
        );
        assert_eq!(
            user(Some("t"), Some(now + Duration::seconds(30))).cached_token(now),
            None
        );
        assert_eq!(
            user(Some("t"), Some(now - Duration::hours(1))).cached_token(now),
            None
        );
    }

    #[test]
    fn test_authorized_user_parsing() {
        let text = r#"{
            "token": "ya29.old",
            "refresh_token": "1//refresh",
            "client_id": "id.apps.googleusercontent.com",
            "client_secret": "shh",
            "scopes": ["https://www.googleapis.com/auth/spreadsheets"],
            "expiry": "2024-05-01T12:00:00.000000Z"
        }"#;
        let parsed: AuthorizedUser = serde_json::from_str(text).unwrap();
        assert_eq!(parsed.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(parsed.token.as_deref(), Some("ya29.old"));
        assert!(parsed.expiry.is_some());
        assert!(parsed.extra.contains_key("scopes"));

        let written = serde_json::to_value(&parsed).unwrap();
        assert_eq!(written["scopes"][0], "https://www.googleapis.com/auth/spreadsheets");
    }
}
