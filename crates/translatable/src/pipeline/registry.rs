//! Hook registry and dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{Event, Hook, Stage};
use crate::error::Result;

/// Stage → hooks, each list kept in weight order.
///
/// Hooks with equal weight run in registration order.
#[derive(Default, Clone)]
pub struct Pipeline {
    hooks: HashMap<Stage, Vec<Arc<dyn Hook>>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a hook to every stage it declares.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        for stage in hook.stages() {
            let list = self.hooks.entry(*stage).or_default();
            list.push(Arc::clone(&hook));
            list.sort_by_key(|h| h.weight());
        }
    }

    /// Hooks for a stage, in weight order.
    pub fn hooks(&self, stage: Stage) -> &[Arc<dyn Hook>] {
        self.hooks.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn hook_names(&self, stage: Stage) -> Vec<&str> {
        self.hooks(stage).iter().map(|h| h.name()).collect()
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        !self.hooks(stage).is_empty()
    }

    /// Run every hook of `stage` against `event`.
    ///
    /// Stops at the first failing hook and returns its error.
    pub async fn dispatch(&self, stage: Stage, event: &mut Event) -> Result<()> {
        for hook in self.hooks(stage) {
            debug!(stage = %stage, hook = %hook.name(), "running hook");
            if let Err(e) = hook.run(stage, event).await {
                warn!(stage = %stage, hook = %hook.name(), error = %e, "hook failed");
                return Err(e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (stage, hooks) in &self.hooks {
            map.entry(stage, &hooks.iter().map(|h| h.name()).collect::<Vec<_>>());
        }
        map.finish()
    }
}
