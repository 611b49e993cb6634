use crate::error::CoreError;
use crate::protocol::SshCredentials;
use crate::storage::KeyValueStore;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

pub const CREDENTIALS_KEY: &str = "tui-ssh-credentials";
pub const TIMESTAMP_KEY: &str = "tui-ssh-timestamp";

/// Reconnect record kept in plain text, like the browser build kept it in
/// local storage. Two keys are read together and treated as one record.
#[derive(Clone)]
pub struct CredentialCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_ttl(store, Duration::hours(24))
    }

    pub fn with_ttl(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn save(&self, credentials: &SshCredentials) -> Result<(), CoreError> {
        self.save_at(credentials, Utc::now().timestamp_millis())
    }

    pub fn save_at(&self, credentials: &SshCredentials, now_ms: i64) -> Result<(), CoreError> {
        let json = serde_json::to_string(credentials)
            .map_err(|e| CoreError::Invalid(e.to_string()))?;
        self.store.set(CREDENTIALS_KEY, &json)?;
        self.store.set(TIMESTAMP_KEY, &now_ms.to_string())?;
        debug!(target_host = %credentials.host, "reconnect record saved");
        Ok(())
    }

    pub fn load(&self) -> Result<Option<SshCredentials>, CoreError> {
        self.load_at(Utc::now().timestamp_millis())
    }

    /// Returns the record if still inside the TTL. Anything else found under
    /// the two keys (expired, half-written, unparsable) is deleted.
    pub fn load_at(&self, now_ms: i64) -> Result<Option<SshCredentials>, CoreError> {
        let credentials = self.store.get(CREDENTIALS_KEY)?;
        let timestamp = self.store.get(TIMESTAMP_KEY)?;
        let (credentials, timestamp) = match (credentials, timestamp) {
            (None, None) => return Ok(None),
            (Some(c), Some(t)) => (c, t),
            _ => {
                debug!("dropping half-written reconnect record");
                self.clear()?;
                return Ok(None);
            }
        };

        let Ok(saved_at) = timestamp.trim().parse::<i64>() else {
            warn!("reconnect timestamp unreadable, clearing record");
            self.clear()?;
            return Ok(None);
        };
        if now_ms - saved_at >= self.ttl.num_milliseconds() {
            debug!(age_ms = now_ms - saved_at, "reconnect record expired");
            self.clear()?;
            return Ok(None);
        }

        match serde_json::from_str::<SshCredentials>(&credentials) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                warn!(error = %err, "failed to parse saved credentials");
                self.clear()?;
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), CoreError> {
        self.store.remove(CREDENTIALS_KEY)?;
        self.store.remove(TIMESTAMP_KEY)?;
        Ok(())
    }
}
