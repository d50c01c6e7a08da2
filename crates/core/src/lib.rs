//! `console-core`: data model shared by the admin console client.
//!
//! This crate contains **pure** types (no I/O): identifiers, the REST envelope,
//! and the canonical records every other crate works with. Shape-shifting wire
//! fields are normalized here, once, when data enters the system.

pub mod envelope;
pub mod error;
pub mod id;
pub mod model;

pub use envelope::{ApiEnvelope, Pagination};
pub use error::{DomainError, DomainResult};
pub use id::{BusinessUnitId, ClientId, CountryId, RoleId, UserId};
pub use model::{
    AdminUser, BusinessUnitOption, ClientOption, Country, ImageRef, NamedRef, Role, RoleRef,
    Status,
};
