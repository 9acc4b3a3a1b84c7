//! Layer configuration, loadable from JSON.

use blockforge_kernels::error::Result;
use blockforge_kernels::{ensure_config, KernelRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MAX_SEQ_LEN: usize = 2048;
pub const DEFAULT_ROPE_BASE: f32 = 10_000.0;
pub const DEFAULT_KERNEL: &str = "reference";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotaryConfig {
    /// Rotated feature width; must be even.
    pub dim: usize,
    /// Advisory upper bound on positions. Longer sequences are allowed but logged.
    pub max_seq_len: usize,
    pub base: f32,
}

impl Default for RotaryConfig {
    fn default() -> Self {
        Self {
            dim: 64,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
            base: DEFAULT_ROPE_BASE,
        }
    }
}

impl RotaryConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.dim > 0 && self.dim % 2 == 0,
            "rotary dimension must be a positive even integer, got {}",
            self.dim
        );
        ensure_config!(
            self.max_seq_len > 0,
            "max_seq_len must be positive, got {}",
            self.max_seq_len
        );
        ensure_config!(
            self.base.is_finite() && self.base > 1.0,
            "rope base must be a finite value greater than 1, got {}",
            self.base
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedForwardConfig {
    pub in_features: usize,
    pub hidden_features: usize,
    pub out_features: usize,
    pub bias: bool,
    /// Name of the matmul kernel in the default registry.
    pub kernel: String,
}

impl Default for FeedForwardConfig {
    fn default() -> Self {
        Self {
            in_features: 512,
            hidden_features: 1376,
            out_features: 512,
            bias: true,
            kernel: DEFAULT_KERNEL.to_string(),
        }
    }
}

impl FeedForwardConfig {
    pub fn new(in_features: usize, hidden_features: usize, out_features: usize) -> Self {
        Self {
            in_features,
            hidden_features,
            out_features,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure_config!(
            self.in_features > 0 && self.hidden_features > 0 && self.out_features > 0,
            "feature counts must be positive, got in={} hidden={} out={}",
            self.in_features,
            self.hidden_features,
            self.out_features
        );
        KernelRegistry::with_default_matmul_kernels().require_matmul_kernel(&self.kernel)?;
        Ok(())
    }
}

/// Configuration for one transformer block's rotary table and feed-forward sublayer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub rotary: RotaryConfig,
    pub feed_forward: FeedForwardConfig,
}

impl BlockConfig {
    /// Tiny config for quick iteration
    pub fn tiny() -> Self {
        Self {
            rotary: RotaryConfig {
                dim: 16,
                max_seq_len: 128,
                base: DEFAULT_ROPE_BASE,
            },
            feed_forward: FeedForwardConfig::new(32, 64, 32),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.rotary.validate()?;
        self.feed_forward.validate()
    }
}
