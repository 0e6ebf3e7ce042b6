//! Regression losses shared by the value critic and the dynamics model.

pub mod functions;

pub use functions::{Loss, SmoothL1Loss};
