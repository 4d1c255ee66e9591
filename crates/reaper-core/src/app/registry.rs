//! PolicyRegistry - one reap policy per resource kind.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{ReapError, ResourceKind};
use crate::policies::ReapPolicy;

/// Registered policies, keyed by the kind they reap.
///
/// # Example
/// ```ignore
/// let mut registry = PolicyRegistry::new();
/// registry.register(DiskPolicy)?;
/// let policy = registry.get(ResourceKind::Disk)?;
/// ```
#[derive(Default, Clone)]
pub struct PolicyRegistry {
    policies: HashMap<ResourceKind, Arc<dyn ReapPolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ReapPolicy + 'static>(&mut self, policy: P) -> Result<(), ReapError> {
        self.register_arc(Arc::new(policy))
    }

    pub fn register_arc(&mut self, policy: Arc<dyn ReapPolicy>) -> Result<(), ReapError> {
        let kind = policy.kind();
        if self.policies.contains_key(&kind) {
            return Err(ReapError::DuplicatePolicy(kind));
        }
        self.policies.insert(kind, policy);
        Ok(())
    }

    pub fn get(&self, kind: ResourceKind) -> Result<Arc<dyn ReapPolicy>, ReapError> {
        self.policies
            .get(&kind)
            .cloned()
            .ok_or(ReapError::PolicyNotFound(kind))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<_> = self.policies.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
