//! Application layer - Use cases and orchestration
//!
//! Contains the estimator's asynchronous behaviour: debounced address search,
//! two-stage distance resolution, the engagement escalation timer and the
//! controller that wires them to the pure fare calculation in `domain`.
//! External services are reached only through the traits in [`ports`].

pub mod error;
pub mod ports;
pub mod services;

pub use error::ApplicationError;
pub use ports::*;
pub use services::*;
