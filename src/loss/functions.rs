use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Trait defining the interface for loss functions
pub trait Loss: Send + Sync {
    /// Mean loss over every element of the batch
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32;

    /// Gradient of [`Loss::compute_batch`] with respect to the predictions
    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32>;
}

/// Huber loss (smooth L1), mean-reduced.
///
/// With `delta = 1` this is `0.5 * x^2` for `|x| <= 1` and `|x| - 0.5`
/// otherwise.
#[derive(Clone, Copy, Debug)]
pub struct SmoothL1Loss {
    pub delta: f32,
}

impl SmoothL1Loss {
    pub fn new(delta: f32) -> Self {
        SmoothL1Loss { delta }
    }

    fn elementwise(&self, x: f32) -> f32 {
        let abs_x = x.abs();
        if abs_x <= self.delta {
            0.5 * x * x
        } else {
            self.delta * abs_x - 0.5 * self.delta * self.delta
        }
    }

    fn slope(&self, x: f32) -> f32 {
        x.clamp(-self.delta, self.delta)
    }

    /// Mean loss over two vectors of equal length.
    pub fn compute(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let total: f32 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &t)| self.elementwise(p - t))
            .sum();
        total / predictions.len() as f32
    }

    /// Gradient of [`SmoothL1Loss::compute`] with respect to the predictions.
    pub fn gradient(&self, predictions: ArrayView1<f32>, targets: ArrayView1<f32>) -> Array1<f32> {
        let n = predictions.len().max(1) as f32;
        predictions
            .iter()
            .zip(targets.iter())
            .map(|(&p, &t)| self.slope(p - t) / n)
            .collect()
    }
}

impl Default for SmoothL1Loss {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Loss for SmoothL1Loss {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        if predictions.is_empty() {
            return 0.0;
        }
        let diff = &predictions - &targets;
        diff.mapv(|x| self.elementwise(x)).sum() / predictions.len() as f32
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        let n = predictions.len().max(1) as f32;
        let diff = &predictions - &targets;
        diff.mapv(|x| self.slope(x) / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_smooth_l1_quadratic_and_linear_regions() {
        let loss = SmoothL1Loss::default();
        let pred = array![0.5, 3.0];
        let target = array![0.0, 0.0];
        // 0.5 * 0.25 = 0.125, 3.0 - 0.5 = 2.5, mean = 1.3125
        assert!((loss.compute(pred.view(), target.view()) - 1.3125).abs() < 1e-6);
        let grad = loss.gradient(pred.view(), target.view());
        assert_eq!(grad, array![0.25, 0.5]);
    }

    #[test]
    fn test_batch_matches_flat() {
        let loss = SmoothL1Loss::default();
        let pred = array![[0.5, 3.0], [-2.0, 0.1]];
        let target = Array2::zeros((2, 2));
        let flat_pred = array![0.5, 3.0, -2.0, 0.1];
        let flat_target = Array1::zeros(4);
        let a = loss.compute_batch(pred.view(), target.view());
        let b = loss.compute(flat_pred.view(), flat_target.view());
        assert!((a - b).abs() < 1e-6);
        let g = loss.gradient_batch(pred.view(), target.view());
        assert_eq!(g[[1, 0]], -0.25);
    }
}
