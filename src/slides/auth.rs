//! Google API access tokens
//!
//! - `ServiceAccountTokenSource`: RS256 JWT assertion exchanged at the token
//!   endpoint, cached until shortly before expiry
//! - `StaticTokenSource`: a bearer token supplied by configuration

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::DeckConfig;
use crate::constants::google::{ASSERTION_LIFETIME_SECS, SCOPES, TOKEN_REFRESH_MARGIN_SECS};
use crate::types::{DeckError, ErrorClassifier, Result};

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

pub type SharedTokenSource = Arc<dyn TokenSource + Send + Sync>;

/// Build the token source configured for the deck
///
/// A key file wins over a static token.
pub fn create_token_source(config: &DeckConfig) -> Result<SharedTokenSource> {
    if let Some(path) = &config.credentials_path {
        let mut key = ServiceAccountKey::from_file(path)?;
        if key.token_uri.is_empty() {
            key.token_uri = config.token_uri.clone();
        }
        return Ok(Arc::new(ServiceAccountTokenSource::new(key)?));
    }
    if let Some(token) = &config.access_token {
        return Ok(Arc::new(StaticTokenSource::new(token.clone())));
    }
    Err(DeckError::Auth(
        "No Google credentials: set deck.credentials_path or deck.access_token".to_string(),
    ))
}

// =============================================================================
// Static Token
// =============================================================================

pub struct StaticTokenSource {
    token: SecretString,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.expose_secret().to_string())
    }
}

// =============================================================================
// Service Account
// =============================================================================

/// Fields of a service-account JSON key that the token exchange needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DeckError::Auth(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            DeckError::Auth(format!(
                "Invalid service account key {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DeckError::Auth(format!("Invalid service account private key: {}", e)))?;
        Ok(Self {
            key,
            encoding_key,
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        })
    }

    fn build_assertion(&self, now: i64) -> Result<String> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| DeckError::Auth(format!("Failed to sign assertion: {}", e)))
    }

    async fn fetch_token(&self, assertion: &str) -> Result<CachedToken> {
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion),
            ])
            .send()
            .await
            .map_err(|e| {
                DeckError::Google(ErrorClassifier::classify(
                    &format!("Token request failed: {}", e),
                    "google",
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeckError::Auth(format!(
                "Token exchange rejected ({}): {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DeckError::Auth(format!("Invalid token response: {}", e)))?;
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: chrono::Utc::now().timestamp() + token.expires_in,
        })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let mut cache = self.cached.lock().await;
        if let Some(token) = cache
            .as_ref()
            .filter(|t| t.expires_at.saturating_sub(TOKEN_REFRESH_MARGIN_SECS) > now)
        {
            return Ok(token.access_token.clone());
        }

        debug!(account = %self.key.client_email, "Refreshing Google access token");
        let assertion = self.build_assertion(now)?;
        let token = self.fetch_token(&assertion).await?;
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }
}
