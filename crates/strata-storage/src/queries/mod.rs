//! Raw SQL operations, one module per table.

pub mod entity_ops;
pub mod version_ops;

use strata_core::errors::StorageError;
use strata_core::models::Attributes;
use strata_core::StrataError;

pub(crate) fn parse_attributes(column: &str, raw: &str) -> Result<Attributes, StrataError> {
    serde_json::from_str(raw).map_err(|e| {
        StrataError::StorageError(StorageError::Corrupt {
            message: format!("{column}: {e}"),
        })
    })
}

pub(crate) fn parse_opt_ts(
    raw: Option<String>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, StrataError> {
    raw.as_deref()
        .map(crate::parse_ts)
        .transpose()
        .map_err(StrataError::from)
}
