//! Shared helpers for kernel implementations.

use crate::activation::activate_inplace;
use crate::config::ActivationKind;
use crate::ensure_shape;
use crate::error::Result;
use ndarray::{Array2, ArrayView1, ArrayView2};

pub fn validate_matmul_inputs(lhs: &ArrayView2<'_, f32>, rhs: &ArrayView2<'_, f32>) -> Result<()> {
    ensure_shape!(
        lhs.ncols() == rhs.nrows(),
        "matmul dimension mismatch: lhs {}x{} vs rhs {}x{}",
        lhs.nrows(),
        lhs.ncols(),
        rhs.nrows(),
        rhs.ncols()
    );
    Ok(())
}

/// Kernel epilogue: add a per-column bias to every row, then apply the activation.
pub fn apply_bias_activation(
    mut output: Array2<f32>,
    bias: Option<&ArrayView1<'_, f32>>,
    activation: ActivationKind,
) -> Result<Array2<f32>> {
    if let Some(bias) = bias {
        ensure_shape!(
            bias.len() == output.ncols(),
            "bias length {} incompatible with output {:?}",
            bias.len(),
            output.shape()
        );
        output += bias;
    }

    activate_inplace(&mut output, activation);
    Ok(output)
}
