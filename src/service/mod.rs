//! Validation, relation fetch, projection and many-to-many maintenance, and the
//! `EntityService` composing them into read/write paths.

mod crud;
mod fetch;
mod many;
mod projection;
mod validation;
pub use crud::EntityService;
pub use fetch::FetchEngine;
pub use many::ManyToManyMutator;
pub use projection::project;
pub use validation::{ValueValidator, Violation, ViolationKind};
