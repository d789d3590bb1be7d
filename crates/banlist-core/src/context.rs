//! Explicit effect context handed to the engine, scheduler and commands.

use std::sync::Arc;

use crate::effects::{GuildGateway, Pacer, RegistryStore};

/// Handles to every external collaborator.
///
/// Built once at startup and cloned cheaply into background tasks.
#[derive(Clone)]
pub struct EnforcementContext {
    /// Registry and configuration storage
    pub store: Arc<dyn RegistryStore>,
    /// Chat platform access
    pub gateway: Arc<dyn GuildGateway>,
    /// Sleep and jitter source
    pub pacer: Arc<dyn Pacer>,
}

impl EnforcementContext {
    /// Bundle the three effect handlers.
    pub fn new(
        store: Arc<dyn RegistryStore>,
        gateway: Arc<dyn GuildGateway>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            store,
            gateway,
            pacer,
        }
    }
}

impl std::fmt::Debug for EnforcementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnforcementContext").finish_non_exhaustive()
    }
}
