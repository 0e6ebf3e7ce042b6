//! The seam between the planner and the function approximators it drives.
//!
//! The value critic, its target copy and the dynamics model are all treated
//! as opaque differentiable predictors. Anything that can run a batched
//! forward pass, take a gradient step on its last forward pass and blend its
//! parameters with a structurally identical copy can be plugged in.
//! [`crate::network::NeuralNetwork`] is the implementation used by default.

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::Result;

pub trait Approximator: Clone {
    /// Width of each input row.
    fn input_size(&self) -> usize;

    /// Width of each output row.
    fn output_size(&self) -> usize;

    /// Batched forward pass. The activations of this call are kept for the
    /// next [`Approximator::apply_gradients`].
    fn predict(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Back-propagate `dL/d(output)` through the most recent forward pass and
    /// take one optimizer step.
    fn apply_gradients(&mut self, output_gradients: ArrayView2<f32>, learning_rate: f32) -> Result<()>;

    /// Copy every parameter of `source` into `self`.
    fn hard_update_from(&mut self, source: &Self) -> Result<()>;

    /// `self = tau * source + (1 - tau) * self`, elementwise.
    fn soft_update_from(&mut self, source: &Self, tau: f32) -> Result<()>;

    /// All parameters flattened in a stable order.
    fn parameters(&self) -> Array1<f32>;
}
