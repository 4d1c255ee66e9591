//! reaper-core
//!
//! Finds abandoned cloud resources and deletes them with bounded concurrency.
//!
//! # Modules
//! - **domain**: resource identity, candidates, tasks, outcomes, errors, events
//! - **ports**: seams to the outside (CloudApi, LivenessProbe, CommandRunner, Clock, ...)
//! - **policies**: per-kind predicates deciding what is abandoned
//! - **app**: batch runner, bounded executor, collector, config
//! - **impls**: gcloud/HTTP adapters and in-memory fakes

pub mod app;
pub mod domain;
pub mod impls;
pub mod policies;
pub mod ports;
