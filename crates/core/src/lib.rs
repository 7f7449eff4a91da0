//! Domain records, admin schema and pure helpers shared by the storage layer
//! and the HTTP surface.

pub mod dashboard;
pub mod export;
pub mod form;
pub mod listing;
pub mod money;
pub mod schema;
pub mod seed;
pub mod types;

pub use money::Money;
pub use schema::{EntityKind, FieldKind, FieldSpec, FieldValue, Resource};
