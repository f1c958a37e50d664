use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

/// Leeway subtracted from the expiry claim so a token about to lapse is
/// treated as already stale.
const EXPIRY_LEEWAY_SECS: i64 = 5;

/// The access/refresh pair issued by `/auth/login` and rotated by
/// `/auth/refresh`. At most one pair is live per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

/// Where the live pair survives process restarts. The store itself never
/// performs network I/O; persistence is the only side channel.
#[async_trait]
pub trait CredentialPersistence: Send + Sync {
    async fn load(&self) -> Result<Option<Credential>>;
    async fn save(&self, credential: &Credential) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// JSON-file persistence, the native equivalent of the browser session
/// storage the board originally relied on.
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CredentialPersistence for FileCredentials {
    async fn load(&self) -> Result<Option<Credential>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).context("reading credential file"),
        };
        let credential =
            serde_json::from_slice(&bytes).context("parsing persisted credential")?;
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("creating credential directory")?;
        }
        let bytes = serde_json::to_vec(credential).context("serializing credential")?;
        tokio::fs::write(&self.path, bytes)
            .await
            .context("writing credential file")
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context("removing credential file"),
        }
    }
}

/// Owner of the live credential pair. The API client reads from it on every
/// request; only login and the refresh success/failure paths write to it.
pub struct CredentialStore {
    inner: RwLock<Option<Credential>>,
    persistence: Option<Box<dyn CredentialPersistence>>,
}

impl CredentialStore {
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(None),
            persistence: None,
        }
    }

    pub fn with_persistence(persistence: Box<dyn CredentialPersistence>) -> Self {
        Self {
            inner: RwLock::new(None),
            persistence: Some(persistence),
        }
    }

    /// Loads a previously persisted pair into memory, if one exists.
    pub async fn restore(&self) -> Result<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        if let Some(credential) = persistence.load().await? {
            *self.inner.write().await = Some(credential);
        }
        Ok(())
    }

    /// Atomically replaces the live pair. A persistence failure keeps the
    /// in-memory pair usable for the rest of the session.
    pub async fn set(&self, credential: Credential) {
        {
            let mut guard = self.inner.write().await;
            *guard = Some(credential.clone());
        }
        if let Some(persistence) = &self.persistence {
            if let Err(err) = persistence.save(&credential).await {
                warn!(error = %err, "failed to persist credential");
            }
        }
    }

    pub async fn get(&self) -> Option<Credential> {
        self.inner.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|c| c.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.as_ref().map(|c| c.refresh_token.clone())
    }

    pub async fn clear(&self) {
        {
            let mut guard = self.inner.write().await;
            *guard = None;
        }
        if let Some(persistence) = &self.persistence {
            if let Err(err) = persistence.clear().await {
                warn!(error = %err, "failed to clear persisted credential");
            }
        }
    }

    /// Checks the access token's embedded expiry claim without a network
    /// call. A present token with no decodable `exp` counts as valid (the
    /// backend does not always stamp one); an absent token counts as
    /// expired.
    pub async fn is_expired(&self) -> bool {
        let Some(token) = self.access_token().await else {
            return true;
        };
        match decode_exp_claim(&token) {
            Some(exp) => exp <= Utc::now().timestamp() + EXPIRY_LEEWAY_SECS,
            None => false,
        }
    }
}

/// Unverified peek at the JWT payload. Signature checks are the server's
/// concern; the client only needs the expiry.
fn decode_exp_claim(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_claims(claims: serde_json::Value) -> String {
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("header.{payload}.signature")
    }

    fn pair(access_token: String) -> Credential {
        Credential {
            access_token,
            refresh_token: "refresh".into(),
        }
    }

    #[tokio::test]
    async fn absent_token_is_expired() {
        let store = CredentialStore::in_memory();
        assert!(store.is_expired().await);
    }

    #[tokio::test]
    async fn token_without_exp_claim_is_valid() {
        let store = CredentialStore::in_memory();
        store
            .set(pair(token_with_claims(serde_json::json!({"sub": "user"}))))
            .await;
        assert!(!store.is_expired().await);
    }

    #[tokio::test]
    async fn undecodable_token_is_valid() {
        let store = CredentialStore::in_memory();
        store.set(pair("not-a-jwt".into())).await;
        assert!(!store.is_expired().await);
    }

    #[tokio::test]
    async fn past_exp_claim_is_expired() {
        let store = CredentialStore::in_memory();
        let exp = Utc::now().timestamp() - 60;
        store
            .set(pair(token_with_claims(serde_json::json!({"exp": exp}))))
            .await;
        assert!(store.is_expired().await);
    }

    #[tokio::test]
    async fn future_exp_claim_is_valid() {
        let store = CredentialStore::in_memory();
        let exp = Utc::now().timestamp() + 3600;
        store
            .set(pair(token_with_claims(serde_json::json!({"exp": exp}))))
            .await;
        assert!(!store.is_expired().await);
    }

    #[tokio::test]
    async fn set_replaces_and_clear_removes() {
        let store = CredentialStore::in_memory();
        store.set(pair("first".into())).await;
        store.set(pair("second".into())).await;
        assert_eq!(store.access_token().await.as_deref(), Some("second"));
        store.clear().await;
        assert!(store.get().await.is_none());
    }
}
