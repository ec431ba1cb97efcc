use std::sync::Arc;

use derive_new::new;

use crate::completion::Engine;
use crate::policy::Policy;
use crate::streak::TierTable;

#[derive(Debug, Clone, new)]
pub struct AppState {
    pub engine: Engine,
    pub policy: Arc<dyn Policy>,
}

impl AppState {
    pub fn tiers(&self) -> &TierTable {
        &self.engine.settings().tiers
    }
}
