mod attribute_access;
mod tracked;
mod version_store;

pub use attribute_access::AttributeAccess;
pub use tracked::Tracked;
pub use version_store::{IVersionStore, PointInTime};
