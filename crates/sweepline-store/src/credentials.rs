//! Credentials for the realtime database REST interface
//!
//! A legacy database secret goes out as the `auth` query parameter. A
//! service-account key is exchanged for a Google OAuth2 access token, sent
//! as `access_token` and cached until shortly before it expires.

use crate::StoreError;
use google_cloud_auth::credentials::CredentialsFile;
use google_cloud_auth::project::Config;
use google_cloud_auth::token::DefaultTokenSourceProvider;
use google_cloud_token::TokenSourceProvider;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Scopes the database accepts for service-account access
const FIREBASE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/firebase.database",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Lifetime assumed for a fetched access token (1 hour)
const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Refresh this long before the assumed expiry (5 minutes)
const TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(300);

/// How a store instance authenticates
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Legacy database secret
    DatabaseSecret(String),
    /// Path to a service-account key file
    ServiceAccountFile(PathBuf),
    /// Service-account key JSON
    ServiceAccountJson(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::DatabaseSecret(_) => f.write_str("DatabaseSecret(<redacted>)"),
            Credentials::ServiceAccountFile(path) => {
                f.debug_tuple("ServiceAccountFile").field(path).finish()
            }
            Credentials::ServiceAccountJson(_) => f.write_str("ServiceAccountJson(<redacted>)"),
        }
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Turns configured credentials into a query parameter per request
pub(crate) struct Authenticator {
    credentials: Option<Credentials>,
    token_cache: RwLock<Option<CachedToken>>,
}

impl Authenticator {
    pub(crate) fn new(credentials: Option<Credentials>) -> Self {
        Self {
            credentials,
            token_cache: RwLock::new(None),
        }
    }

    /// Query pair carrying the credential, if any
    pub(crate) async fn query_pair(&self) -> Result<Option<(&'static str, String)>, StoreError> {
        match &self.credentials {
            None => Ok(None),
            Some(Credentials::DatabaseSecret(secret)) => Ok(Some(("auth", secret.clone()))),
            Some(Credentials::ServiceAccountFile(_)) | Some(Credentials::ServiceAccountJson(_)) => {
                Ok(Some(("access_token", self.access_token().await?)))
            }
        }
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() + TOKEN_REFRESH_BUFFER {
                    return Ok(cached.token.clone());
                }
            }
        }

        let key_json = match &self.credentials {
            Some(Credentials::ServiceAccountFile(path)) => {
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    StoreError::Auth(format!(
                        "reading service account key file '{}': {}",
                        path.display(),
                        e
                    ))
                })?
            }
            Some(Credentials::ServiceAccountJson(json)) => json.clone(),
            _ => return Err(StoreError::Auth("no service account configured".to_string())),
        };

        let token = fetch_access_token(&key_json).await?;
        tracing::debug!("Fetched database access token");

        let mut cache = self.token_cache.write().await;
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + TOKEN_LIFETIME,
        });

        Ok(token)
    }
}

/// Exchange a service-account key for an access token
async fn fetch_access_token(key_json: &str) -> Result<String, StoreError> {
    let creds: CredentialsFile = serde_json::from_str(key_json)
        .map_err(|e| StoreError::Auth(format!("parsing service account key: {}", e)))?;

    let config = Config::default().with_scopes(&FIREBASE_SCOPES);
    let provider = DefaultTokenSourceProvider::new_with_credentials(config, Box::new(creds))
        .await
        .map_err(|e| StoreError::Auth(format!("creating token source: {}", e)))?;

    let token = provider
        .token_source()
        .token()
        .await
        .map_err(|e| StoreError::Auth(format!("fetching access token: {}", e)))?;

    // Token sources hand back a ready-made `Authorization` value
    Ok(token.strip_prefix("Bearer ").unwrap_or(&token).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_credentials() {
        let auth = Authenticator::new(None);
        assert_eq!(auth.query_pair().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_database_secret() {
        let auth = Authenticator::new(Some(Credentials::DatabaseSecret("s3cret".to_string())));
        assert_eq!(
            auth.query_pair().await.unwrap(),
            Some(("auth", "s3cret".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let auth = Authenticator::new(Some(Credentials::ServiceAccountJson("{}".to_string())));
        *auth.token_cache.write().await = Some(CachedToken {
            token: "ya29.cached".to_string(),
            expires_at: Instant::now() + TOKEN_LIFETIME,
        });

        assert_eq!(
            auth.query_pair().await.unwrap(),
            Some(("access_token", "ya29.cached".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firebase-key.json");
        let auth = Authenticator::new(Some(Credentials::ServiceAccountFile(path)));

        assert!(matches!(auth.query_pair().await, Err(StoreError::Auth(_))));
    }

    #[tokio::test]
    async fn test_unparsable_key() {
        let auth = Authenticator::new(Some(Credentials::ServiceAccountJson("not json".to_string())));
        assert!(matches!(auth.query_pair().await, Err(StoreError::Auth(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let secret = format!("{:?}", Credentials::DatabaseSecret("s3cret".to_string()));
        let json = format!("{:?}", Credentials::ServiceAccountJson("{\"private_key\":\"k\"}".to_string()));
        assert!(!secret.contains("s3cret"));
        assert!(!json.contains("private_key"));
    }
}
