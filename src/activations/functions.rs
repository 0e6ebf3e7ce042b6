use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Activation applied after a dense layer's affine transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    #[default]
    Relu,
    LeakyRelu { alpha: f32 },
    Tanh,
    Linear,
}

impl Activation {
    /// Apply the activation to a batch of pre-activations in-place.
    pub fn apply_batch(&self, inputs: &mut Array2<f32>) {
        match *self {
            Activation::Relu => inputs.mapv_inplace(|v| v.max(0.0)),
            Activation::LeakyRelu { alpha } => {
                inputs.mapv_inplace(|v| if v > 0.0 { v } else { alpha * v })
            }
            Activation::Tanh => inputs.mapv_inplace(f32::tanh),
            Activation::Linear => {}
        }
    }

    /// Derivative of the activation evaluated at the given pre-activations.
    pub fn derivative_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        match *self {
            Activation::Relu => inputs.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::LeakyRelu { alpha } => inputs.mapv(|v| if v > 0.0 { 1.0 } else { alpha }),
            Activation::Tanh => inputs.mapv(|v| {
                let t = v.tanh();
                1.0 - t * t
            }),
            Activation::Linear => Array2::ones(inputs.dim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_relu_batch() {
        let mut x = array![[-1.0, 0.0, 2.0]];
        Activation::Relu.apply_batch(&mut x);
        assert_eq!(x, array![[0.0, 0.0, 2.0]]);
        let d = Activation::Relu.derivative_batch(array![[-1.0, 0.5]].view());
        assert_eq!(d, array![[0.0, 1.0]]);
    }

    #[test]
    fn test_leaky_relu_slope() {
        let act = Activation::LeakyRelu { alpha: 0.1 };
        let mut x = array![[-2.0, 3.0]];
        act.apply_batch(&mut x);
        assert!((x[[0, 0]] + 0.2).abs() < 1e-6);
        assert_eq!(act.derivative_batch(array![[-2.0, 3.0]].view()), array![[0.1, 1.0]]);
    }

    #[test]
    fn test_linear_is_identity() {
        let mut x = array![[-1.5, 4.0]];
        Activation::Linear.apply_batch(&mut x);
        assert_eq!(x, array![[-1.5, 4.0]]);
        assert_eq!(Activation::Linear.derivative_batch(x.view()), Array2::<f32>::ones((1, 2)));
    }
}
