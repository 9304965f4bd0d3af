use std::sync::Arc;

use rfm_core::control::ProcessEnv;
use rfm_core::inference::{HttpInferenceService, InferenceError};
use rfm_core::services::{SessionManager, SessionManagerConfig, global_session_manager};
use rfm_core::source::ArrowTableLoader;

use crate::config::RfmConfig;

/// Builds the process-wide session manager backed by the HTTP inference service.
pub fn build_session_manager(config: &RfmConfig) -> Result<SessionManager, InferenceError> {
    let service = HttpInferenceService::new(config.api_url.clone(), config.request_timeout)?;
    let manager_config = SessionManagerConfig::new(
        Arc::new(ArrowTableLoader::new()),
        Arc::new(service),
        Arc::new(ProcessEnv),
    );
    Ok(global_session_manager(|| SessionManager::new(manager_config)).clone())
}
