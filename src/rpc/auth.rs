//! Authentication token handling.
//!
//! Tokens are JWTs whose payload carries an `exp` claim. A token survives
//! across sessions in a small cache file under the user cache directory; it
//! is expiry-checked before every reuse and replaced whenever a fresh login
//! produces a new one. An unparseable token counts as expired.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use tracing::{debug, info, warn};

use super::client::RpcClient;
use super::error::{RpcError, RpcResult};
use super::protocol::LoginInfo;
use crate::config::Settings;

/// Well-known id of the server's login service.
const LOGIN_SERVICE: &str = "public/hypha-login";

/// How long to wait for an interactive login to complete.
const LOGIN_TIMEOUT_SECS: u64 = 120;

/// Interval between login poll attempts.
const LOGIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Extract the `exp` claim (unix seconds) from a JWT.
pub fn parse_jwt_exp(token: &str) -> Option<u64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_u64()
}

/// Check whether a token is expired.
///
/// Tokens without a readable `exp` claim are treated as expired so they are
/// never reused.
pub fn is_token_expired(token: &str) -> bool {
    let Some(exp) = parse_jwt_exp(token) else {
        return true;
    };
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(u64::MAX);
    now >= exp
}

/// On-disk token cache, persisted across sessions.
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// Cache at an explicit path (used by tests).
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache at the default location under the user cache directory.
    pub fn default_location() -> Self {
        let path = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("quarry")
            .join("token");
        Self { path }
    }

    /// Load the cached token, if any.
    pub fn load(&self) -> Option<String> {
        let token = fs::read_to_string(&self.path).ok()?;
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }

    /// Store a token, replacing any previous one.
    pub fn store(&self, token: &str) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(error = %e, "failed to create token cache directory");
                return;
            }
        }
        if let Err(e) = fs::write(&self.path, token) {
            warn!(error = %e, "failed to persist token");
        }
    }

    /// Remove the cached token.
    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Resolve a usable authentication token.
///
/// Precedence: explicitly configured token, then the cached one; either is
/// only reused when unexpired. Otherwise a fresh interactive login is
/// triggered and its token replaces the cached one.
pub async fn resolve_token(settings: &Settings) -> RpcResult<String> {
    resolve_token_with_cache(settings, &TokenCache::default_location()).await
}

/// [`resolve_token`] against an explicit cache location.
pub async fn resolve_token_with_cache(
    settings: &Settings,
    cache: &TokenCache,
) -> RpcResult<String> {
    let explicit = match settings.server.resolved_token() {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "configured token could not be resolved");
            None
        }
    };

    if let Some(token) = explicit.or_else(|| cache.load()) {
        if !is_token_expired(&token) {
            return Ok(token);
        }
        debug!("token expired; starting fresh login");
    }

    let token = login(settings).await?;
    cache.store(&token);
    Ok(token)
}

/// Run the interactive login flow against the server's login service.
///
/// Connects anonymously, asks the login service for a login URL, surfaces it
/// to the user, and polls until a token is issued or the wait times out.
pub async fn login(settings: &Settings) -> RpcResult<String> {
    let client = RpcClient::connect(settings, None).await?;
    let service = client.get_service(LOGIN_SERVICE);

    let login: LoginInfo = service.call_typed("start", serde_json::json!({})).await?;
    info!(url = %login.login_url, "waiting for login to complete");
    println!("Login required. Open this URL in a browser:\n  {}", login.login_url);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(LOGIN_TIMEOUT_SECS);
    loop {
        if tokio::time::Instant::now() >= deadline {
            return Err(RpcError::LoginTimeout(LOGIN_TIMEOUT_SECS));
        }

        let token: Option<String> = service
            .call_typed("check", serde_json::json!({ "key": login.key }))
            .await
            .unwrap_or(None);

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            info!("login completed");
            return Ok(token);
        }

        tokio::time::sleep(LOGIN_POLL_INTERVAL).await;
    }
}
