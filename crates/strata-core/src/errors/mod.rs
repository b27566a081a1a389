mod storage_error;
mod strata_error;
mod temporal_error;

pub use storage_error::StorageError;
pub use strata_error::{FailureOutcome, StrataError, StrataResult};
pub use temporal_error::TemporalError;
