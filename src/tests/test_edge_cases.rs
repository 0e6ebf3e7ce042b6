use ndarray::{array, Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::activations::Activation;
use crate::approximator::Approximator;
use crate::error::DynaError;
use crate::experience::{Experience, ExperienceBatch};
use crate::loss::{Loss, SmoothL1Loss};
use crate::network::NeuralNetwork;
use crate::optimizer::{OptimizerWrapper, SGD};

#[test]
fn test_activation_edge_cases() {
    let activations = [
        Activation::Relu,
        Activation::LeakyRelu { alpha: 0.01 },
        Activation::Tanh,
        Activation::Linear,
    ];
    for activation in activations {
        let mut large = array![[1e10, -1e10, 0.0, -0.0]];
        activation.apply_batch(&mut large);
        for &v in large.iter() {
            assert!(v.is_finite(), "{:?} produced non-finite value", activation);
        }
        let grads = activation.derivative_batch(array![[1e10, -1e10]].view());
        assert!(grads.iter().all(|g| g.is_finite()));
    }
}

#[test]
fn test_smooth_l1_huge_errors_have_bounded_gradient() {
    let loss = SmoothL1Loss::default();
    let predictions = array![[1e6, -1e6]];
    let targets = Array2::zeros((1, 2));
    let grad = loss.gradient_batch(predictions.view(), targets.view());
    assert!(grad.iter().all(|g| g.abs() <= 0.5 + 1e-6));
}

#[test]
fn test_predict_rejects_wrong_width() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut net = NeuralNetwork::mlp(3, &[4], 2, OptimizerWrapper::SGD(SGD::new()), &mut rng).unwrap();
    assert!(matches!(
        net.predict(Array2::zeros((2, 4)).view()),
        Err(DynaError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_gradient_without_forward_pass() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut net = NeuralNetwork::mlp(3, &[4], 2, OptimizerWrapper::SGD(SGD::new()), &mut rng).unwrap();
    assert!(net.apply_gradients(Array2::zeros((1, 2)).view(), 0.1).is_err());
}

#[test]
fn test_single_sample_batch() {
    let batch = ExperienceBatch::from_experiences(&[Experience::new(
        Array1::zeros(1),
        0,
        0.0,
        Array1::zeros(1),
        true,
    )])
    .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.continuation_mask(), array![0.0]);
}
