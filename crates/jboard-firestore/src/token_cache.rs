//! Cached OAuth access tokens for the Firestore REST API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the cached token expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Tokens are cached for a fixed TTL below Google's one-hour default
/// rather than parsing the provider's reported expiry.
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    /// Fresh enough to hand out without refreshing.
    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    /// Not yet expired. Used as a fallback when a refresh fails.
    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

pub struct TokenCache {
    auth: Arc<dyn TokenProvider>,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            auth,
            cache: RwLock::new(None),
        }
    }

    /// A valid access token, refreshed when the cached one is close to
    /// expiry. Concurrent callers coordinate through the write lock so a
    /// refresh only runs once.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.as_ref() {
                if token.is_valid() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while this one waited for the lock.
        if let Some(token) = cache.as_ref() {
            if token.is_valid() {
                return Ok(token.access_token.clone());
            }
        }

        match self.refresh().await {
            Ok(fresh) => {
                debug!("Refreshed Firestore access token");
                let access_token = fresh.access_token.clone();
                *cache = Some(fresh);
                Ok(access_token)
            }
            Err(e) => {
                if let Some(stale) = cache.as_ref() {
                    if stale.is_usable() {
                        warn!(error = %e, "Token refresh failed, serving cached token");
                        return Ok(stale.access_token.clone());
                    }
                }
                Err(e)
            }
        }
    }

    async fn refresh(&self) -> FirestoreResult<CachedToken> {
        let token = self
            .auth
            .token(&[FIRESTORE_SCOPE])
            .await
            .map_err(|e| FirestoreError::auth_error(format!("Failed to fetch access token: {e}")))?;
        Ok(CachedToken {
            access_token: token.as_str().to_string(),
            expires_at: Instant::now() + TOKEN_DEFAULT_TTL,
        })
    }

    /// Drop the cached token, forcing a refresh on the next request. Called
    /// when the API rejects a request as unauthenticated.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
        debug!("Access token cache invalidated");
    }
}
