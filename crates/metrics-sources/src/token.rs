//! Access-token lifecycle for the remote measurement service.
//!
//! The token moves through explicit states: nothing known, a cached value
//! loaded from disk but not yet checked, and a server-accepted value. An
//! expired token is not a stored state; it shows up as a 401 on a request
//! and is handled by the fetch path with a single refresh-and-retry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use metrics_core::{MetricsError, Result};
use serde_json::Value;
use tracing::debug;

use crate::transport::{truncate_body, Transport};

/// Key under which the token is stored in the cache file.
const TOKEN_KEY: &str = "ACCESS_TOKEN=";

/// Network timeout for the token validation call.
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Network timeout for the password-grant call.
const GRANT_TIMEOUT: Duration = Duration::from_secs(10);

// ── Credentials ───────────────────────────────────────────────────────────────

/// Resource-owner credentials for the password-grant flow.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub client_id: String,
}

// ── TokenState ────────────────────────────────────────────────────────────────

/// Lifecycle states of the access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    /// No token is known.
    NoToken,
    /// A token was loaded from the cache file but not yet checked.
    CachedUnvalidated(String),
    /// The server has accepted the token.
    Valid(String),
}

// ── TokenManager ──────────────────────────────────────────────────────────────

/// Owns the token state and its on-disk cache.
#[derive(Debug)]
pub struct TokenManager {
    token_file: PathBuf,
    state: TokenState,
}

impl TokenManager {
    pub fn new(token_file: PathBuf) -> Self {
        Self {
            token_file,
            state: TokenState::NoToken,
        }
    }

    /// Load a previously cached token, if the cache file exists.
    ///
    /// An absent or unreadable file leaves the state untouched; the caller
    /// falls through to the grant flow instead.
    pub fn load_cached(&mut self) {
        let Ok(content) = std::fs::read_to_string(&self.token_file) else {
            debug!(path = %self.token_file.display(), "no cached token");
            return;
        };
        for line in content.lines() {
            if let Some(token) = line.trim().strip_prefix(TOKEN_KEY) {
                if !token.is_empty() {
                    self.state = TokenState::CachedUnvalidated(token.to_string());
                }
                break;
            }
        }
    }

    /// Ask the server whether the current token is still accepted.
    ///
    /// Without a token this is a local no-op. HTTP 200 moves the token to
    /// [`TokenState::Valid`]; any other status, and any network failure,
    /// discards it. An invalid token is expected state, not an error.
    pub fn validate(&mut self, transport: &mut dyn Transport, api_base: &str) -> bool {
        let token = match &self.state {
            TokenState::NoToken => return false,
            TokenState::CachedUnvalidated(t) | TokenState::Valid(t) => t.clone(),
        };

        let url = format!("{}/api/v1/current_user", api_base);
        let authorization = format!("Bearer {}", token);
        match transport.get(
            &url,
            &[("Authorization", &authorization)],
            Some(VALIDATE_TIMEOUT),
        ) {
            Ok(response) if response.status == 200 => {
                self.state = TokenState::Valid(token);
                true
            }
            Ok(response) => {
                debug!(status = response.status, "cached token rejected");
                self.state = TokenState::NoToken;
                false
            }
            Err(e) => {
                debug!(error = %e, "token validation request failed");
                self.state = TokenState::NoToken;
                false
            }
        }
    }

    /// Obtain a fresh token via the password grant and persist it.
    ///
    /// The response body is parsed as JSON regardless of HTTP status and
    /// judged solely by the presence of a non-empty `access_token`.
    pub fn request_new(
        &mut self,
        transport: &mut dyn Transport,
        api_base: &str,
        credentials: &Credentials,
    ) -> Result<()> {
        let url = format!("{}/oauth/token", api_base);
        let form = [
            ("grant_type", "password"),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("client_id", credentials.client_id.as_str()),
        ];

        let response = transport.post_form(&url, &form, Some(GRANT_TIMEOUT))?;
        let payload: Value = serde_json::from_str(&response.body)?;
        let token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .unwrap_or("");
        if token.is_empty() {
            return Err(MetricsError::Auth(format!(
                "no access token in server response: {}",
                truncate_body(&response.body)
            )));
        }

        self.save(token)?;
        self.state = TokenState::Valid(token.to_string());
        debug!("obtained fresh access token");
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// The current token string, validated or not.
    pub fn token(&self) -> Option<&str> {
        match &self.state {
            TokenState::NoToken => None,
            TokenState::CachedUnvalidated(t) | TokenState::Valid(t) => Some(t),
        }
    }

    /// `true` once the server has accepted the current token.
    pub fn is_valid(&self) -> bool {
        matches!(self.state, TokenState::Valid(_))
    }

    pub fn state(&self) -> &TokenState {
        &self.state
    }

    // ── Persistence ───────────────────────────────────────────────────────

    /// Write the token to the cache file, restricted to the owner.
    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.token_file.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.token_file, format!("{}{}\n", TOKEN_KEY, token))?;
        restrict_to_owner(&self.token_file)?;
        Ok(())
    }
}

/// Make the token cache readable and writable by the owner only.
#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
