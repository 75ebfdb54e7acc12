//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::BackendConfig;
use chrono::Utc;
use shared::client::{ClientError, DatabaseClient, SqlBackend};
use shared::time::{normalize_timezone, ClientContext, Timezone};
use std::sync::Arc;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The database backend.
    backend: Arc<dyn SqlBackend>,
    /// Zone the server presents timestamps in.
    timezone: Timezone,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(backend: Arc<dyn SqlBackend>, timezone: Timezone) -> Self {
        Self { backend, timezone }
    }

    /// Creates a state backed by the database described in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_backend_config(config: &BackendConfig) -> Result<Self, ClientError> {
        let client = DatabaseClient::new(config.to_settings())?;
        Ok(Self::new(Arc::new(client), normalize_timezone(&config.timezone)))
    }

    /// Returns a reference to the database backend.
    #[must_use]
    pub fn backend(&self) -> &dyn SqlBackend {
        self.backend.as_ref()
    }

    /// The server's configured timezone.
    #[must_use]
    pub fn timezone(&self) -> Timezone {
        self.timezone
    }

    /// Client context for the current instant in the configured zone.
    #[must_use]
    pub fn client_context(&self) -> ClientContext {
        ClientContext::new(self.timezone, Utc::now())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::test_state;
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        let (state, backend) = test_state();
        let state2 = state.clone();
        tokio_test::block_on(state2.backend().run_sql("SELECT 1")).unwrap();
        assert_eq!(backend.executed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_client_context_uses_configured_zone() {
        let (state, _) = test_state();
        let state = AppState::new(state.backend, normalize_timezone("+05:30"));
        assert_eq!(state.client_context().utc_offset_minutes(), 330);
    }

    #[test]
    fn test_from_backend_config() {
        let state = AppState::from_backend_config(&BackendConfig::default()).unwrap();
        assert_eq!(state.timezone(), Timezone::Utc);
    }
}
