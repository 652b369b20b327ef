//! `FocusFlow` Core: schema descriptors, validation, the collection catalog,
//! and provisioning outcome types.

pub mod catalog;
pub mod outcome;
pub mod schema;

pub use outcome::{EntityRef, Outcome, ProvisionReport, Status};
pub use schema::{
    AttributeKind, AttributeSpec, Capability, CollectionSpec, DatabaseSpec, IndexKind, IndexSpec,
    Permission, Role, SchemaError, SortOrder,
};
