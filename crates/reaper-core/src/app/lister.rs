//! Resource Lister.
//!
//! `Listing` は 1 バッチが扱う候補の一回きりのシーケンス。
//! `CloudApi::list` の完全な応答一つから作る。一覧取得に失敗したら何も返さない
//! （部分的な一覧で削除を始めない）。

use tracing::info;

use crate::domain::{Candidate, QueryError, ResourceKind};
use crate::ports::{CloudApi, ListFilter};

/// Finite, non-restartable sequence of candidates. Re-create it per batch.
#[derive(Debug)]
pub struct Listing {
    kind: ResourceKind,
    items: std::vec::IntoIter<Candidate>,
}

impl Listing {
    pub fn new(kind: ResourceKind, candidates: Vec<Candidate>) -> Self {
        Self {
            kind,
            items: candidates.into_iter(),
        }
    }

    /// Lists `kind` through `api`.
    pub async fn fetch(
        api: &dyn CloudApi,
        kind: ResourceKind,
        filter: &ListFilter,
    ) -> Result<Self, QueryError> {
        let candidates = api.list(kind, filter).await?;
        info!(kind = %kind, count = candidates.len(), "listed candidates");
        Ok(Self::new(kind, candidates))
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Iterator for Listing {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for Listing {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Location;
    use crate::impls::memory::InMemoryCloud;

    #[tokio::test]
    async fn fetch_yields_each_candidate_once() {
        let cloud = InMemoryCloud::new()
            .with(Candidate::bare(ResourceKind::Disk, Location::Zone("z".into()), "a"))
            .with(Candidate::bare(ResourceKind::Disk, Location::Zone("z".into()), "b"))
            .with(Candidate::bare(ResourceKind::Image, Location::Global, "gcr.io/x@sha256:1"));

        let mut listing = Listing::fetch(&cloud, ResourceKind::Disk, &ListFilter::default())
            .await
            .unwrap();
        assert_eq!(listing.len(), 2);

        let names: Vec<_> = listing.by_ref().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(listing.next().is_none());
    }

    #[tokio::test]
    async fn listing_failure_is_a_query_error() {
        let cloud = InMemoryCloud::new().fail_list(ResourceKind::Disk);
        let err = Listing::fetch(&cloud, ResourceKind::Disk, &ListFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::List { .. }));
    }
}
