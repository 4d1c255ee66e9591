//! Errors and their classification.
//!
//! # 分類
//! - `QueryError`: 一覧取得・事前 lookup の失敗。バッチ全体を中断する
//! - `EvaluationError`: 述語の二次クエリ（describe / probe）の失敗。
//!   その Candidate だけ SKIPPED にして、他は続行
//! - `DeletionError`: delete 呼び出し一件の失敗。その Candidate に記録する
//! - `ReapError`: バッチを開始できなかった理由

use std::time::Duration;

use thiserror::Error;

use super::resource::{ResourceKind, ResourceRef};

/// Failure of a subprocess call (the cloud CLI).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("listing {kind} failed: {source}")]
    List {
        kind: ResourceKind,
        #[source]
        source: CommandError,
    },

    #[error("describe {id} failed: {source}")]
    Describe {
        id: ResourceRef,
        #[source]
        source: CommandError,
    },

    #[error("malformed response for {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("listing {0} needs a scope")]
    MissingScope(ResourceKind),

    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },

    #[error("{0}")]
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("secondary query for {id} failed: {reason}")]
    Query { id: ResourceRef, reason: String },

    #[error("liveness probe of {url} failed: {reason}")]
    Probe { url: String, reason: String },
}

impl EvaluationError {
    pub fn query(id: &ResourceRef, err: impl std::fmt::Display) -> Self {
        Self::Query {
            id: id.clone(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeletionError {
    #[error("{0}")]
    Command(#[from] CommandError),

    #[error("delete did not finish within {0:?}")]
    Timeout(Duration),

    #[error("dependent {dependent} could not be deleted: {reason}")]
    DependentFailed { dependent: ResourceRef, reason: String },

    #[error("{0} no longer exists")]
    NotFound(ResourceRef),

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("cannot parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that abort a batch before or instead of deleting anything.
#[derive(Debug, Error)]
pub enum ReapError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no policy registered for {0}")]
    PolicyNotFound(ResourceKind),

    #[error("duplicate policy for {0}")]
    DuplicatePolicy(ResourceKind),
}
