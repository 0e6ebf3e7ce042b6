use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::activations::Activation;
use crate::approximator::Approximator;
use crate::error::{DynaError, Result};
use crate::layers::DenseLayer;
use crate::optimizer::{Optimizer, OptimizerWrapper};

/// A multilayer perceptron with its own optimizer state.
///
/// This is the default function approximator behind both the value critic
/// and the dynamics model. It keeps the activations of its most recent
/// forward pass so that gradients computed by the caller with respect to
/// the outputs can be back-propagated through [`Approximator::apply_gradients`].
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NeuralNetwork {
    pub layers: Vec<DenseLayer>,
    pub optimizer: OptimizerWrapper,
}

impl NeuralNetwork {
    /// Create a network with the given layer sizes and one activation per
    /// weight layer.
    pub fn new<R: Rng>(
        layer_sizes: &[usize],
        activations: &[Activation],
        optimizer: OptimizerWrapper,
        rng: &mut R,
    ) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(DynaError::invalid_parameter(
                "layer_sizes",
                "network must have at least input and output layers",
            ));
        }
        if layer_sizes.len() - 1 != activations.len() {
            return Err(DynaError::invalid_parameter(
                "activations",
                "number of activations must match number of layers - 1",
            ));
        }
        if layer_sizes.iter().any(|&size| size == 0) {
            return Err(DynaError::invalid_parameter("layer_sizes", "layer sizes must be non-zero"));
        }

        let layers = layer_sizes
            .windows(2)
            .zip(activations.iter())
            .map(|(window, &activation)| DenseLayer::new(window[0], window[1], activation, rng))
            .collect();

        Ok(NeuralNetwork { layers, optimizer })
    }

    /// ReLU hidden layers followed by a linear output layer.
    pub fn mlp<R: Rng>(
        input_size: usize,
        hidden: &[usize],
        output_size: usize,
        optimizer: OptimizerWrapper,
        rng: &mut R,
    ) -> Result<Self> {
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(input_size);
        sizes.extend_from_slice(hidden);
        sizes.push(output_size);

        let mut activations = vec![Activation::Relu; hidden.len()];
        activations.push(Activation::Linear);

        Self::new(&sizes, &activations, optimizer, rng)
    }

    /// Forward pass for a single input vector.
    pub fn forward(&mut self, input: ArrayView1<f32>) -> Array1<f32> {
        let output = self.forward_batch(input.insert_axis(Axis(0)));
        output.index_axis_move(Axis(0), 0)
    }

    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current = inputs.to_owned();
        for layer in &mut self.layers {
            current = layer.forward_batch(current.view());
        }
        current
    }

    fn backward_batch(&self, output_errors: ArrayView2<f32>) -> Result<Vec<(Array2<f32>, Array1<f32>)>> {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut current_error = output_errors.to_owned();

        for (i, layer) in self.layers.iter().enumerate().rev() {
            let (adjusted_error, weight_gradients, bias_gradients) =
                layer.backward_batch(current_error.view())?;
            gradients.push((weight_gradients, bias_gradients));
            if i != 0 {
                current_error = adjusted_error.dot(&layer.weights.t());
            }
        }

        gradients.reverse();
        Ok(gradients)
    }

    /// Save the network (weights and optimizer state) with bincode.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(bincode::deserialize(&data)?)
    }

    fn check_compatible(&self, source: &Self) -> Result<()> {
        let same_shape = self.layers.len() == source.layers.len()
            && self
                .layers
                .iter()
                .zip(&source.layers)
                .all(|(a, b)| a.weights.dim() == b.weights.dim());
        if same_shape {
            Ok(())
        } else {
            Err(DynaError::dimension_mismatch(
                format!("{:?}", self.layer_shapes()),
                format!("{:?}", source.layer_shapes()),
            ))
        }
    }

    fn layer_shapes(&self) -> Vec<(usize, usize)> {
        self.layers.iter().map(|l| l.weights.dim()).collect()
    }
}

impl Approximator for NeuralNetwork {
    fn input_size(&self) -> usize {
        self.layers.first().map_or(0, DenseLayer::input_size)
    }

    fn output_size(&self) -> usize {
        self.layers.last().map_or(0, DenseLayer::output_size)
    }

    fn predict(&mut self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        if inputs.ncols() != self.input_size() {
            return Err(DynaError::dimension_mismatch(
                format!("{} input columns", self.input_size()),
                format!("{} input columns", inputs.ncols()),
            ));
        }
        Ok(self.forward_batch(inputs))
    }

    fn apply_gradients(&mut self, output_gradients: ArrayView2<f32>, learning_rate: f32) -> Result<()> {
        let gradients = self.backward_batch(output_gradients)?;

        self.optimizer.begin_step();
        for (index, (layer, (weight_gradients, bias_gradients))) in
            self.layers.iter_mut().zip(gradients).enumerate()
        {
            self.optimizer.update_weights(index, &mut layer.weights, &weight_gradients, learning_rate);
            self.optimizer.update_biases(index, &mut layer.biases, &bias_gradients, learning_rate);
        }
        Ok(())
    }

    fn hard_update_from(&mut self, source: &Self) -> Result<()> {
        self.check_compatible(source)?;
        for (target, source) in self.layers.iter_mut().zip(&source.layers) {
            target.weights.assign(&source.weights);
            target.biases.assign(&source.biases);
        }
        Ok(())
    }

    fn soft_update_from(&mut self, source: &Self, tau: f32) -> Result<()> {
        self.check_compatible(source)?;
        for (target, source) in self.layers.iter_mut().zip(&source.layers) {
            target.weights.zip_mut_with(&source.weights, |t, &s| *t = tau * s + (1.0 - tau) * *t);
            target.biases.zip_mut_with(&source.biases, |t, &s| *t = tau * s + (1.0 - tau) * *t);
        }
        Ok(())
    }

    fn parameters(&self) -> Array1<f32> {
        self.layers
            .iter()
            .flat_map(|layer| layer.weights.iter().chain(layer.biases.iter()).copied())
            .collect()
    }
}
