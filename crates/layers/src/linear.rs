//! Dense affine layer: `y = x · W + b`.

use blockforge_kernels::error::{Error, Result};
use blockforge_kernels::{
    ensure_config, ensure_shape, ActivationKind, DynMatmulKernel, MatmulInputs, ReferenceMatmul,
};
use ndarray::{Array1, Array2, ArrayBase, ArrayD, Data, Dimension, IxDyn};
use std::fmt;
use std::sync::Arc;

pub struct Linear {
    /// (in_features, out_features)
    weight: Array2<f32>,
    bias: Option<Array1<f32>>,
    kernel: DynMatmulKernel,
}

impl Linear {
    /// Fresh layer with weights and bias drawn uniformly from `±1/sqrt(in_features)`.
    pub fn new(in_features: usize, out_features: usize, bias: bool) -> Result<Self> {
        ensure_config!(
            in_features > 0 && out_features > 0,
            "linear layer needs positive dimensions, got {}x{}",
            in_features,
            out_features
        );

        let bound = 1.0 / (in_features as f32).sqrt();
        let sample = || (fastrand::f32() * 2.0 - 1.0) * bound;
        let weight = Array2::from_shape_fn((in_features, out_features), |_| sample());
        let bias = bias.then(|| Array1::from_shape_fn(out_features, |_| sample()));

        Self::from_parts(weight, bias)
    }

    pub fn from_parts(weight: Array2<f32>, bias: Option<Array1<f32>>) -> Result<Self> {
        ensure_config!(
            weight.nrows() > 0 && weight.ncols() > 0,
            "linear weight must be non-empty, got {:?}",
            weight.shape()
        );
        if let Some(bias) = &bias {
            ensure_config!(
                bias.len() == weight.ncols(),
                "bias length {} does not match out_features {}",
                bias.len(),
                weight.ncols()
            );
        }

        Ok(Self {
            weight,
            bias,
            kernel: Arc::new(ReferenceMatmul::new()),
        })
    }

    pub fn with_kernel(mut self, kernel: DynMatmulKernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn in_features(&self) -> usize {
        self.weight.nrows()
    }

    pub fn out_features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    pub fn bias(&self) -> Option<&Array1<f32>> {
        self.bias.as_ref()
    }

    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, Array1::len)
    }

    /// Input `(..., in_features)`, output `(..., out_features)`.
    pub fn forward<S, D>(&self, x: &ArrayBase<S, D>) -> Result<ArrayD<f32>>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        self.forward_activated(x, ActivationKind::None)
    }

    /// Like [`forward`](Self::forward), with `activation` fused into the kernel epilogue.
    pub fn forward_activated<S, D>(
        &self,
        x: &ArrayBase<S, D>,
        activation: ActivationKind,
    ) -> Result<ArrayD<f32>>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        ensure_shape!(x.ndim() > 0, "linear layer input must have at least one axis");
        let shape = x.shape();
        let width = shape[shape.len() - 1];
        ensure_shape!(
            width == self.in_features(),
            "input feature width {} does not match in_features {}",
            width,
            self.in_features()
        );

        // Leading axes collapse into matmul rows.
        let rows: usize = shape[..shape.len() - 1].iter().product();
        let lhs = x
            .to_shape((rows, width))
            .map_err(|err| Error::shape(format!("cannot flatten input: {}", err)))?;

        let inputs = MatmulInputs::new(
            lhs.view(),
            self.weight.view(),
            self.bias.as_ref().map(Array1::view),
            activation,
        );
        let output = self.kernel.run(&inputs.problem(), &inputs)?;

        let mut out_shape = shape[..shape.len() - 1].to_vec();
        out_shape.push(self.out_features());
        output
            .into_shape_with_order(IxDyn(&out_shape))
            .map_err(|err| Error::shape(format!("cannot restore leading axes: {}", err)))
    }
}

impl fmt::Debug for Linear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features())
            .field("out_features", &self.out_features())
            .field("bias", &self.bias.is_some())
            .field("kernel", &self.kernel.name())
            .finish()
    }
}
