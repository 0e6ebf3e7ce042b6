//! # Activation Functions
//!
//! Element-wise non-linearities used by the hidden and output layers of the
//! value critic and the dynamics model.
//!
//! - **ReLU**: `max(0, x)`, the default for hidden layers
//! - **LeakyReLU**: ReLU with a small negative slope
//! - **Tanh**: bounded output in `(-1, 1)`
//! - **Linear**: identity, used for Q-value and state/reward regression heads

pub mod functions;

pub use functions::Activation;
