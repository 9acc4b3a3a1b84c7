//! SwiGLU feed-forward: `down(silu(gate(x)) * up(x))`.

use crate::config::FeedForwardConfig;
use crate::linear::Linear;
use blockforge_kernels::error::Result;
use blockforge_kernels::{
    ensure_config, ensure_shape, ActivationKind, DynMatmulKernel, KernelRegistry,
};
use ndarray::{ArrayBase, ArrayD, Data, Dimension};
use tracing::debug;

#[derive(Debug)]
pub struct SwiGlu {
    gate_proj: Linear,
    up_proj: Linear,
    down_proj: Linear,
}

impl SwiGlu {
    pub fn new(
        in_features: usize,
        hidden_features: usize,
        out_features: usize,
        bias: bool,
    ) -> Result<Self> {
        ensure_config!(
            in_features > 0 && hidden_features > 0 && out_features > 0,
            "feature counts must be positive, got in={} hidden={} out={}",
            in_features,
            hidden_features,
            out_features
        );

        let gate_proj = Linear::new(in_features, hidden_features, bias)?;
        let up_proj = Linear::new(in_features, hidden_features, bias)?;
        let down_proj = Linear::new(hidden_features, out_features, bias)?;
        debug!(
            in_features,
            hidden_features,
            out_features,
            bias,
            "initialised swiglu feed-forward"
        );

        Self::from_projections(gate_proj, up_proj, down_proj)
    }

    pub fn from_config(config: &FeedForwardConfig) -> Result<Self> {
        config.validate()?;
        let kernel =
            KernelRegistry::with_default_matmul_kernels().require_matmul_kernel(&config.kernel)?;
        Ok(Self::new(
            config.in_features,
            config.hidden_features,
            config.out_features,
            config.bias,
        )?
        .with_kernel(kernel))
    }

    /// Assemble from existing projections, e.g. weights loaded elsewhere.
    pub fn from_projections(gate_proj: Linear, up_proj: Linear, down_proj: Linear) -> Result<Self> {
        ensure_config!(
            gate_proj.in_features() == up_proj.in_features(),
            "gate and up projections disagree on input width: {} vs {}",
            gate_proj.in_features(),
            up_proj.in_features()
        );
        ensure_config!(
            gate_proj.out_features() == up_proj.out_features(),
            "gate and up projections disagree on hidden width: {} vs {}",
            gate_proj.out_features(),
            up_proj.out_features()
        );
        ensure_config!(
            down_proj.in_features() == gate_proj.out_features(),
            "down projection expects {} inputs but hidden width is {}",
            down_proj.in_features(),
            gate_proj.out_features()
        );

        Ok(Self {
            gate_proj,
            up_proj,
            down_proj,
        })
    }

    /// Route all three projections through `kernel`.
    pub fn with_kernel(self, kernel: DynMatmulKernel) -> Self {
        Self {
            gate_proj: self.gate_proj.with_kernel(kernel.clone()),
            up_proj: self.up_proj.with_kernel(kernel.clone()),
            down_proj: self.down_proj.with_kernel(kernel),
        }
    }

    pub fn in_features(&self) -> usize {
        self.gate_proj.in_features()
    }

    pub fn hidden_features(&self) -> usize {
        self.gate_proj.out_features()
    }

    pub fn out_features(&self) -> usize {
        self.down_proj.out_features()
    }

    pub fn gate_proj(&self) -> &Linear {
        &self.gate_proj
    }

    pub fn up_proj(&self) -> &Linear {
        &self.up_proj
    }

    pub fn down_proj(&self) -> &Linear {
        &self.down_proj
    }

    pub fn kernel_name(&self) -> &'static str {
        self.down_proj.kernel_name()
    }

    pub fn num_parameters(&self) -> usize {
        self.gate_proj.num_parameters()
            + self.up_proj.num_parameters()
            + self.down_proj.num_parameters()
    }

    /// Input `(..., in_features)`, output `(..., out_features)`.
    pub fn forward<S, D>(&self, x: &ArrayBase<S, D>) -> Result<ArrayD<f32>>
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        ensure_shape!(x.ndim() > 0, "feed-forward input must have at least one axis");
        let width = x.shape()[x.ndim() - 1];
        ensure_shape!(
            width == self.in_features(),
            "input feature width {} does not match in_features {}",
            width,
            self.in_features()
        );

        // SiLU runs in the gate projection's epilogue.
        let mut hidden = self.gate_proj.forward_activated(x, ActivationKind::Silu)?;
        let up = self.up_proj.forward(x)?;
        hidden *= &up;

        self.down_proj.forward(&hidden)
    }
}
