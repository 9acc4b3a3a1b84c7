//! Matrix multiplication kernels.

use crate::config::{ActivationKind, MatmulProblem};
use crate::ensure_shape;
use crate::error::Result;
use crate::utils::{apply_bias_activation, validate_matmul_inputs};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use std::sync::Arc;

pub struct MatmulInputs<'a> {
    pub lhs: ArrayView2<'a, f32>,
    pub rhs: ArrayView2<'a, f32>,
    pub bias: Option<ArrayView1<'a, f32>>,
    pub activation: ActivationKind,
}

impl<'a> MatmulInputs<'a> {
    pub fn new(
        lhs: ArrayView2<'a, f32>,
        rhs: ArrayView2<'a, f32>,
        bias: Option<ArrayView1<'a, f32>>,
        activation: ActivationKind,
    ) -> Self {
        Self {
            lhs,
            rhs,
            bias,
            activation,
        }
    }

    pub fn problem(&self) -> MatmulProblem {
        MatmulProblem::new(self.lhs.nrows(), self.rhs.ncols(), self.lhs.ncols())
    }
}

pub trait MatmulKernel: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<Array2<f32>>;
}

pub type DynMatmulKernel = Arc<dyn MatmulKernel>;

fn validate_problem(problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<()> {
    validate_matmul_inputs(&inputs.lhs, &inputs.rhs)?;
    ensure_shape!(
        *problem == inputs.problem(),
        "problem {:?} does not describe inputs {:?}",
        problem,
        inputs.problem()
    );
    Ok(())
}

#[derive(Default)]
pub struct ReferenceMatmul;

impl ReferenceMatmul {
    pub fn new() -> Self {
        Self
    }
}

impl MatmulKernel for ReferenceMatmul {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn run(&self, problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<Array2<f32>> {
        validate_problem(problem, inputs)?;

        let result = inputs.lhs.dot(&inputs.rhs);
        apply_bias_activation(result, inputs.bias.as_ref(), inputs.activation)
    }
}

/// Row-parallel matmul: each output row is computed on the rayon pool.
#[derive(Default)]
pub struct ParallelMatmul;

impl ParallelMatmul {
    pub fn new() -> Self {
        Self
    }
}

impl MatmulKernel for ParallelMatmul {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn run(&self, problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<Array2<f32>> {
        validate_problem(problem, inputs)?;

        let lhs = inputs.lhs;
        let rhs = inputs.rhs;
        let mut output = Array2::<f32>::zeros((problem.m, problem.n));

        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row_idx, mut row)| {
                let lhs_row = lhs.row(row_idx);
                for (col_idx, value) in row.iter_mut().enumerate() {
                    *value = lhs_row.dot(&rhs.column(col_idx));
                }
            });

        apply_bias_activation(output, inputs.bias.as_ref(), inputs.activation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    #[test]
    fn parallel_matmul_matches_reference() {
        let problem = MatmulProblem::new(32, 24, 16);
        let lhs = Array2::from_shape_fn((problem.m, problem.k), |(i, j)| (i + j) as f32 * 0.1);
        let rhs = Array2::from_shape_fn((problem.k, problem.n), |(i, j)| (i * j + 1) as f32 * 0.05);
        let bias = Array1::from_shape_fn(problem.n, |j| j as f32 - 3.0);
        let inputs = MatmulInputs::new(
            lhs.view(),
            rhs.view(),
            Some(bias.view()),
            ActivationKind::Silu,
        );

        let reference = ReferenceMatmul::new()
            .run(&problem, &inputs)
            .expect("reference matmul");
        let parallel = ParallelMatmul::new()
            .run(&problem, &inputs)
            .expect("parallel matmul");

        for i in 0..problem.m {
            for j in 0..problem.n {
                assert_abs_diff_eq!(reference[(i, j)], parallel[(i, j)], epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn inner_dimension_mismatch_is_rejected() {
        let lhs = Array2::<f32>::zeros((2, 3));
        let rhs = Array2::<f32>::zeros((4, 2));
        let inputs = MatmulInputs::new(lhs.view(), rhs.view(), None, ActivationKind::None);
        let problem = MatmulProblem::new(2, 2, 3);

        let err = ReferenceMatmul::new().run(&problem, &inputs).unwrap_err();
        assert!(err.is_shape());
        let err = ParallelMatmul::new().run(&problem, &inputs).unwrap_err();
        assert!(err.is_shape());
    }

    #[test]
    fn reference_small_product() {
        let lhs = array![[1.0f32, 2.0], [3.0, 4.0]];
        let rhs = array![[1.0f32, 0.0], [0.0, 1.0]];
        let inputs = MatmulInputs::new(lhs.view(), rhs.view(), None, ActivationKind::None);
        let out = ReferenceMatmul::new()
            .run(&inputs.problem(), &inputs)
            .unwrap();
        assert_eq!(out, lhs);
    }

    #[test]
    fn problem_must_describe_inputs() {
        let lhs = Array2::<f32>::ones((3, 4));
        let rhs = Array2::<f32>::ones((4, 5));
        let inputs = MatmulInputs::new(lhs.view(), rhs.view(), None, ActivationKind::default());
        assert_eq!(inputs.problem(), MatmulProblem::new(3, 5, 4));

        let stale = MatmulProblem::new(3, 5, 2);
        let err = ParallelMatmul::new().run(&stale, &inputs).unwrap_err();
        assert!(err.is_shape());
        let out = ParallelMatmul::new()
            .run(&inputs.problem(), &inputs)
            .unwrap();
        assert!(out.iter().all(|&v| v == 4.0));
    }
}
