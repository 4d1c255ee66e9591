//! ReaperBuilder - wires ports, config and policies into a `Reaper`.
//!
//! # 起動時検証（fail-fast）
//! `expect_kinds` に渡した種別にすべて policy が登録されていないと、
//! `build` は `BuildError::MissingPolicies` を返す。

use std::sync::Arc;

use super::batch::Reaper;
use super::config::ReaperConfig;
use super::executor::CancelHandle;
use super::registry::PolicyRegistry;
use crate::domain::{ReapError, ResourceKind};
use crate::policies::ReapPolicy;
use crate::ports::{
    Clock, CloudApi, EventSink, IdGenerator, LivenessProbe, NoopEventSink, SystemClock,
    UlidGenerator,
};

/// # Example
/// ```ignore
/// let reaper = ReaperBuilder::new(api)
///     .config(config)
///     .register(DiskPolicy)?
///     .expect_kinds(&[ResourceKind::Disk])
///     .build()?;
/// ```
pub struct ReaperBuilder {
    api: Arc<dyn CloudApi>,
    probe: Option<Arc<dyn LivenessProbe>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    ids: Arc<dyn IdGenerator>,
    config: ReaperConfig,
    cancel: CancelHandle,
    registry: PolicyRegistry,
    expected_kinds: Option<Vec<ResourceKind>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no policy registered for: {0:?}")]
    MissingPolicies(Vec<ResourceKind>),
}

impl ReaperBuilder {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self {
            api,
            probe: None,
            clock: Arc::new(SystemClock),
            sink: Arc::new(NoopEventSink),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            config: ReaperConfig::default(),
            cancel: CancelHandle::new(),
            registry: PolicyRegistry::new(),
            expected_kinds: None,
        }
    }

    pub fn probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn config(mut self, config: ReaperConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing cancellation signal (e.g. one wired to Ctrl-C).
    pub fn cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn register<P: ReapPolicy + 'static>(mut self, policy: P) -> Result<Self, ReapError> {
        self.registry.register(policy)?;
        Ok(self)
    }

    pub fn expect_kinds(mut self, kinds: &[ResourceKind]) -> Self {
        self.expected_kinds = Some(kinds.to_vec());
        self
    }

    pub fn build(self) -> Result<Reaper, BuildError> {
        if let Some(expected) = &self.expected_kinds {
            let registered = self.registry.kinds();
            let missing: Vec<ResourceKind> = expected
                .iter()
                .filter(|k| !registered.contains(k))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingPolicies(missing));
            }
        }
        Ok(Reaper {
            api: self.api,
            probe: self.probe,
            clock: self.clock,
            sink: self.sink,
            ids: self.ids,
            config: self.config,
            cancel: self.cancel,
            registry: self.registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::memory::InMemoryCloud;
    use crate::policies::{DiskPolicy, HealthCheckPolicy, TargetPoolPolicy};

    fn api() -> Arc<dyn CloudApi> {
        Arc::new(InMemoryCloud::new())
    }

    #[test]
    fn build_success() {
        let reaper = ReaperBuilder::new(api())
            .register(DiskPolicy)
            .unwrap()
            .expect_kinds(&[ResourceKind::Disk])
            .build();
        assert!(reaper.is_ok());
    }

    #[test]
    fn build_reports_missing_policies() {
        let reaper = ReaperBuilder::new(api())
            .register(TargetPoolPolicy)
            .unwrap()
            .expect_kinds(&[ResourceKind::TargetPool, ResourceKind::HttpHealthCheck])
            .build();
        assert!(matches!(
            reaper,
            Err(BuildError::MissingPolicies(missing)) if missing == vec![ResourceKind::HttpHealthCheck]
        ));
    }

    #[test]
    fn build_without_expectations() {
        let reaper = ReaperBuilder::new(api())
            .register(HealthCheckPolicy)
            .unwrap()
            .build();
        assert!(reaper.is_ok());
    }

    #[test]
    fn duplicate_registration_fails() {
        let result = ReaperBuilder::new(api())
            .register(DiskPolicy)
            .unwrap()
            .register(DiskPolicy);
        assert!(matches!(result, Err(ReapError::DuplicatePolicy(ResourceKind::Disk))));
    }

    #[test]
    fn shared_cancel_handle_reaches_the_reaper() {
        let cancel = CancelHandle::new();
        let reaper = ReaperBuilder::new(api())
            .cancel_handle(cancel.clone())
            .build()
            .unwrap();
        cancel.cancel();
        assert!(reaper.cancel_handle().is_cancelled());
    }
}
