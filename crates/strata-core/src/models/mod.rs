mod context;
mod entity_id;
mod entity_record;
mod filter;
mod state;
mod version_record;

pub use context::{ContextOverrides, ContextSnapshot, ContextValue};
pub use entity_id::EntityId;
pub use entity_record::{Attributes, EntityRecord};
pub use filter::EntityFilter;
pub use state::{EntityState, Resolved, Versioned};
pub use version_record::{Validity, VersionId, VersionOperation, VersionRecord};
