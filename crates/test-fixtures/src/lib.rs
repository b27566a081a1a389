//! Shared fixtures for Strata tests and benches.

pub mod harness;
pub mod models;

pub use harness::{attrs, epoch, Harness};
pub use models::{Comment, Post, User};
