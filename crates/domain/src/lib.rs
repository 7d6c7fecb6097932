//! Domain layer for the St·Surfers fare estimator
//!
//! Contains the pricing rules, location and distance value objects, the
//! engagement state vocabulary and domain errors. Nothing in here performs
//! I/O; the fare calculation is a set of pure functions over these types.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
