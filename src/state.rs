//! Shared application state

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::info;

use crate::config::GatewayConfig;
use crate::error::{Result, ServiceError};
use crate::gemini::GeminiClient;
use crate::retrieval::SessionStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub gemini: Arc<GeminiClient>,
    pub sessions: Arc<SessionStore>,
    /// Bounds concurrent generation calls against the model API.
    pub generation_semaphore: Arc<Semaphore>,
    /// HTML layout template for field extraction, read once at startup.
    pub extract_template: Option<Arc<String>>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let extract_template = match &config.extract_template_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    ServiceError::InvalidConfiguration(format!(
                        "cannot read extract template {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                info!("Loaded extract template ({} bytes)", raw.len());
                Some(Arc::new(raw))
            }
            None => None,
        };

        let gemini = Arc::new(GeminiClient::new(config.gemini.clone())?);
        let generation_semaphore =
            Arc::new(Semaphore::new(config.server.max_concurrent_generations));

        Ok(Self {
            config: Arc::new(config),
            gemini,
            sessions: Arc::new(SessionStore::new()),
            generation_semaphore,
            extract_template,
        })
    }
}
