//! Object-safe interface shared by the trainable layers.

use crate::linear::Linear;
use crate::swiglu::SwiGlu;
use blockforge_kernels::error::Result;
use ndarray::{ArrayD, ArrayViewD};

/// A layer with a single forward computation over `(..., features)` arrays.
///
/// Concrete types also expose a generic inherent `forward`; this trait exists so a
/// surrounding block can hold sublayers as `Box<dyn Layer>`.
pub trait Layer: Send + Sync {
    fn apply(&self, x: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>>;

    fn num_parameters(&self) -> usize;
}

impl Layer for Linear {
    fn apply(&self, x: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
        self.forward(&x)
    }

    fn num_parameters(&self) -> usize {
        Linear::num_parameters(self)
    }
}

impl Layer for SwiGlu {
    fn apply(&self, x: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>> {
        self.forward(&x)
    }

    fn num_parameters(&self) -> usize {
        SwiGlu::num_parameters(self)
    }
}
