//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順で並ぶ
//! - **調整不要**: ロックや採番テーブルなしで生成できる
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を一つだけ持ち、`T` は実行時には使わないマーカー型。
//! `BatchId` と `TaskId` はコンパイル時に混同できない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for every ID type.
///
/// Provides the prefix used by `Display` (`"batch-"`, `"task-"`).
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ID type.
///
/// `T` only exists at compile time (`PhantomData`); the runtime
/// representation is exactly one `Ulid`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// Marker types
// ========================================

/// Marker for one reaping batch (list → evaluate → delete → report).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Batch {}

impl IdMarker for Batch {
    fn prefix() -> &'static str {
        "batch-"
    }
}

/// Marker for one deletion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of a Batch.
pub type BatchId = Id<Batch>;

/// Identifier of a deletion Task within a Batch.
pub type TaskId = Id<Task>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();

        let batch = BatchId::from_ulid(ulid1);
        let task = TaskId::from_ulid(ulid2);

        assert_eq!(batch.as_ulid(), ulid1);
        assert_eq!(task.as_ulid(), ulid2);

        assert!(batch.to_string().starts_with("batch-"));
        assert!(task.to_string().starts_with("task-"));

        // let _: BatchId = task; // <- does not compile
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let id1 = TaskId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TaskId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn phantom_marker_is_zero_sized() {
        use std::mem::size_of;

        assert_eq!(size_of::<BatchId>(), size_of::<Ulid>());
        assert_eq!(size_of::<TaskId>(), 16);
    }
}
