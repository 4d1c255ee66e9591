//! CloudApi port - the cloud resource API the reaper talks to.
//!
//! ネットワークを越える呼び出しはすべてこの trait を通す。
//! テストでは `impls::memory::InMemoryCloud` に差し替えてバッチ処理を回せる。

use async_trait::async_trait;

use crate::domain::{Candidate, DeletionError, Metadata, QueryError, ResourceKind, ResourceRef};

/// Narrows a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Provider filter expression (gcloud `--filter`).
    pub expression: Option<String>,

    /// Collection the kind lives in, when it needs one (image repository).
    pub scope: Option<String>,
}

impl ListFilter {
    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            scope: None,
        }
    }

    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            expression: None,
            scope: Some(scope.into()),
        }
    }
}

/// Generic cloud resource API.
///
/// # Contract
/// - `list` returns the complete current collection or fails; a partial
///   listing is never returned.
/// - `describe` and `list` have no side effects.
/// - `delete` removes exactly one resource.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn list(
        &self,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Vec<Candidate>, QueryError>;

    async fn describe(&self, id: &ResourceRef) -> Result<Metadata, QueryError>;

    async fn delete(&self, id: &ResourceRef) -> Result<(), DeletionError>;
}
