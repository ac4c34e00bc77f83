//! Shared state handed to every route.

use std::sync::Arc;

use crate::core::RelayCore;

/// Cheaply cloneable handle to the relay core.
#[derive(Clone)]
pub struct WebAppState {
    core: Arc<RelayCore>,
}

impl WebAppState {
    pub fn new(core: RelayCore) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    pub fn from_shared(core: Arc<RelayCore>) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &Arc<RelayCore> {
        &self.core
    }
}
