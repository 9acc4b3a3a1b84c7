//! Elementwise activation functions.

use crate::config::ActivationKind;
use ndarray::{ArrayBase, DataMut, Dimension};

/// Logistic sigmoid, evaluated so that large negative inputs do not overflow `exp`.
pub fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// SiLU (swish): `x * sigmoid(x)`.
pub fn silu(x: f32) -> f32 {
    x * sigmoid(x)
}

/// Approximate GELU (tanh formulation).
pub fn gelu(x: f32) -> f32 {
    let c = (2.0 / std::f32::consts::PI).sqrt();
    0.5 * x * (1.0 + (c * (x + 0.044715 * x.powi(3))).tanh())
}

pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

impl ActivationKind {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            ActivationKind::None => x,
            ActivationKind::Relu => relu(x),
            ActivationKind::Gelu => gelu(x),
            ActivationKind::Silu => silu(x),
        }
    }
}

/// Apply `activation` to every element of `data`, splitting the work across the rayon pool.
pub fn activate_inplace<S, D>(data: &mut ArrayBase<S, D>, activation: ActivationKind)
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    if matches!(activation, ActivationKind::None) {
        return;
    }
    data.par_mapv_inplace(|x| activation.apply(x));
}
