// RpaDeck — Backend factory

use super::{http::HttpBackend, AutomationBackend};
use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;

/// Create the automation backend client from the loaded config.
pub fn create_backend(cfg: &Config) -> anyhow::Result<Arc<dyn AutomationBackend>> {
    tracing::info!(
        base_url = %cfg.backend.base_url,
        timeout_secs = cfg.backend.timeout_secs,
        "Creating automation backend client"
    );

    let backend = HttpBackend::new(
        &cfg.backend.base_url,
        Duration::from_secs(cfg.backend.timeout_secs),
        Duration::from_secs(cfg.backend.connect_timeout_secs),
    )?;

    Ok(Arc::new(backend))
}
