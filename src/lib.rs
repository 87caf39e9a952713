//! Secure multi-party computation of a Lagrange interpolation `y* = f(x*)` over a prime-order
//! field, where each of `n` parties privately holds one point `(x_i, y_i)` and no party learns
//! another party's point. See [`orchestrator::run`] for the entry point.

pub mod committee;
pub mod config;
pub mod error;
pub mod field;
pub mod net;
pub mod orchestrator;
pub mod protocol;
pub mod sharing;
pub mod telemetry;

pub use error::Error;
pub use field::{FieldElement, FieldParams};
pub use orchestrator::{Point, RunOutcome};
