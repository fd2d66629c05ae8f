// src/services/credentials.rs
// Credential boundary between the orchestrator and whatever hosts it.
use async_trait::async_trait;
use log::{info, warn};
use tokio::sync::RwLock;

/// Upstream message that means the configured key is unusable.
pub const CREDENTIAL_REJECTED_MARKER: &str = "Requested entity was not found";

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Whether a usable credential is currently configured.
    async fn has_credential(&self) -> bool;

    /// Runs the host's selection flow. Returns whether a credential is
    /// available afterwards.
    async fn request_credential(&self) -> bool;

    /// Marks the current credential as rejected by the service.
    async fn invalidate(&self);
}

/// Holds the API key in memory. Re-prompting re-reads the environment, and
/// the host can install a key directly through [`CredentialStore::set`].
pub struct CredentialStore {
    api_key: RwLock<Option<String>>,
    env_keys: Vec<String>,
}

impl CredentialStore {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            api_key: RwLock::new(initial.filter(|k| !k.trim().is_empty())),
            env_keys: vec!["GEMINI_API_KEY".to_string(), "API_KEY".to_string()],
        }
    }

    pub async fn api_key(&self) -> Option<String> {
        self.api_key.read().await.clone()
    }

    pub async fn set(&self, key: impl Into<String>) -> bool {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return false;
        }
        *self.api_key.write().await = Some(key);
        info!("API credential updated");
        true
    }

    fn key_from_env(&self) -> Option<String> {
        self.env_keys
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
    }
}

#[async_trait]
impl CredentialProvider for CredentialStore {
    async fn has_credential(&self) -> bool {
        self.api_key.read().await.is_some()
    }

    async fn request_credential(&self) -> bool {
        let mut guard = self.api_key.write().await;
        if guard.is_some() {
            return true;
        }
        match self.key_from_env() {
            Some(key) => {
                info!("API credential reloaded from environment");
                *guard = Some(key);
                true
            }
            None => {
                warn!("No API credential available; set one via PUT /api/v1/credential");
                false
            }
        }
    }

    async fn invalidate(&self) {
        warn!("API credential rejected by the service; clearing it");
        *self.api_key.write().await = None;
    }
}
