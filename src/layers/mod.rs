//! Fully connected layers for the default approximators.

pub mod dense;

pub use dense::DenseLayer;
