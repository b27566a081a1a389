//! # strata-core
//!
//! Shared foundation for the Strata temporal versioning engine:
//! errors, configuration, the clock, the version data model and the
//! traits at the persistence and entity-mapping seams.

pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use config::StrataConfig;
pub use errors::{StrataError, StrataResult};
