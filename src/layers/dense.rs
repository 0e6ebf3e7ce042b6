use ndarray::{Array1, Array2, ArrayView2, Axis};
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{DynaError, Result};

/// A fully connected (dense) layer.
///
/// The most recent forward pass is cached so that a following
/// [`DenseLayer::backward_batch`] can compute gradients for it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

impl DenseLayer {
    /// Create a new dense layer. Weights are drawn uniformly from
    /// `[-0.1, 0.1]`, biases start at zero.
    pub fn new<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let weights = Array2::random_using((input_size, output_size), Uniform::new(-0.1, 0.1), rng);
        let biases = Array1::zeros(output_size);
        DenseLayer {
            weights,
            biases,
            activation,
            pre_activation_output: None,
            inputs: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape()[1]
    }

    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Returns `(error w.r.t. pre-activation, weight gradients, bias gradients)`
    /// for the cached forward pass.
    pub fn backward_batch(
        &self,
        output_errors: ArrayView2<f32>,
    ) -> Result<(Array2<f32>, Array2<f32>, Array1<f32>)> {
        let (pre_activation_output, inputs) =
            match (self.pre_activation_output.as_ref(), self.inputs.as_ref()) {
                (Some(pre), Some(inputs)) => (pre, inputs),
                _ => {
                    return Err(DynaError::invalid_parameter(
                        "output_gradients",
                        "no forward pass recorded before backward pass",
                    ))
                }
            };
        if pre_activation_output.dim() != output_errors.dim() {
            return Err(DynaError::dimension_mismatch(
                format!("{:?}", pre_activation_output.dim()),
                format!("{:?}", output_errors.dim()),
            ));
        }

        let activation_deriv = self.activation.derivative_batch(pre_activation_output.view());
        let adjusted_error = &output_errors * &activation_deriv;
        let weight_gradients = inputs.t().dot(&adjusted_error);
        let bias_gradients = adjusted_error.sum_axis(Axis(0));

        Ok((adjusted_error, weight_gradients, bias_gradients))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_dense_forward_shape_and_init_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = DenseLayer::new(3, 5, Activation::Relu, &mut rng);
        assert!(layer.weights.iter().all(|w| w.abs() <= 0.1));
        assert!(layer.biases.iter().all(|&b| b == 0.0));

        let out = layer.forward_batch(array![[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]].view());
        assert_eq!(out.dim(), (2, 5));
    }

    #[test]
    fn test_backward_requires_forward() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = DenseLayer::new(2, 2, Activation::Linear, &mut rng);
        assert!(layer.backward_batch(array![[1.0, 1.0]].view()).is_err());
    }

    #[test]
    fn test_linear_gradients() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut layer = DenseLayer::new(2, 1, Activation::Linear, &mut rng);
        layer.forward_batch(array![[1.0, 2.0]].view());
        let (_, w_grad, b_grad) = layer.backward_batch(array![[0.5]].view()).unwrap();
        assert_eq!(w_grad, array![[0.5], [1.0]]);
        assert_eq!(b_grad, array![0.5]);
    }
}
