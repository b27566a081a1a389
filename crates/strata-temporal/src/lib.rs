//! # strata-temporal
//!
//! Temporal versioning engine for Strata.
//! Writes version records alongside live mutations, resolves entities at
//! arbitrary instants, and drives the trash / untrash / revert lifecycle.

pub mod context;
pub mod correlation;
pub mod engine;
pub mod hooks;
pub mod registry;
pub mod resolver;
pub mod revert;
pub mod transaction;
pub mod trash;
pub mod writer;

pub use context::{ContextGuard, UnitOfWork};
pub use engine::VersioningEngine;
pub use hooks::{HookEvent, HookPoint};
pub use registry::{CascadeRule, EntityKind};
pub use transaction::Transaction;
pub use trash::Untrashed;
