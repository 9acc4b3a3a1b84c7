//! Rotary Position Embeddings (RoPE).
//!
//! Reference: https://arxiv.org/abs/2104.09864
//!
//! The rotation pairs channel `i` with channel `i + dim/2` (the two contiguous
//! halves of the feature axis) rather than interleaving even and odd channels.
//! Weights trained against one layout do not transfer to the other.

use crate::config::{RotaryConfig, DEFAULT_MAX_SEQ_LEN, DEFAULT_ROPE_BASE};
use blockforge_kernels::error::{Error, Result};
use blockforge_kernels::{ensure_config, ensure_shape};
use ndarray::{
    concatenate, Array, Array1, Array2, ArrayBase, Axis, Data, Dimension, RawData, RemoveAxis,
    Slice,
};
use tracing::{debug, warn};

/// Precomputed inverse frequencies for one rotary width.
#[derive(Debug, Clone)]
pub struct RotaryEmbedding {
    dim: usize,
    max_seq_len: usize,
    base: f32,
    inv_freq: Array1<f32>,
}

impl RotaryEmbedding {
    pub fn new(dim: usize, max_seq_len: usize) -> Result<Self> {
        Self::with_base(dim, max_seq_len, DEFAULT_ROPE_BASE)
    }

    pub fn with_base(dim: usize, max_seq_len: usize, base: f32) -> Result<Self> {
        ensure_config!(
            dim > 0 && dim % 2 == 0,
            "rotary dimension must be a positive even integer, got {}",
            dim
        );
        ensure_config!(
            max_seq_len > 0,
            "max_seq_len must be positive, got {}",
            max_seq_len
        );
        ensure_config!(
            base.is_finite() && base > 1.0,
            "rope base must be a finite value greater than 1, got {}",
            base
        );

        let inv_freq =
            Array1::from_shape_fn(dim / 2, |i| 1.0 / base.powf((2 * i) as f32 / dim as f32));
        debug!(dim, max_seq_len, base, "built rotary frequency table");

        Ok(Self {
            dim,
            max_seq_len,
            base,
            inv_freq,
        })
    }

    /// Table with the default advisory length of 2048 positions.
    pub fn with_dim(dim: usize) -> Result<Self> {
        Self::new(dim, DEFAULT_MAX_SEQ_LEN)
    }

    pub fn from_config(config: &RotaryConfig) -> Result<Self> {
        Self::with_base(config.dim, config.max_seq_len, config.base)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn half_dim(&self) -> usize {
        self.dim / 2
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn base(&self) -> f32 {
        self.base
    }

    pub fn inv_freq(&self) -> &Array1<f32> {
        &self.inv_freq
    }

    /// Cos/sin tables of shape `(seq_len, dim / 2)` for positions `0..seq_len`.
    ///
    /// When `seq_len` is `None` it is read from the second-to-last axis of `x`;
    /// `x` is not otherwise inspected.
    pub fn compute_angles<S, D>(
        &self,
        x: &ArrayBase<S, D>,
        seq_len: Option<usize>,
    ) -> Result<(Array2<f32>, Array2<f32>)>
    where
        S: RawData,
        D: Dimension,
    {
        let seq_len = match seq_len {
            Some(seq_len) => seq_len,
            None => sequence_axis_len(x.shape())?,
        };
        self.angles_for_positions(0, seq_len)
    }

    /// Cos/sin tables for positions `offset..offset + seq_len`.
    ///
    /// Row `t` holds `cos((offset + t) * inv_freq[i])`. Tables are rebuilt on every call.
    pub fn angles_for_positions(
        &self,
        offset: usize,
        seq_len: usize,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        let end = offset.checked_add(seq_len).ok_or_else(|| {
            Error::shape(format!(
                "positions starting at {} overflow for sequence length {}",
                offset, seq_len
            ))
        })?;
        if end > self.max_seq_len {
            warn!(
                offset,
                seq_len,
                max_seq_len = self.max_seq_len,
                "rotary positions exceed the configured maximum sequence length"
            );
        }

        let freqs = Array2::from_shape_fn((seq_len, self.half_dim()), |(t, i)| {
            (offset + t) as f32 * self.inv_freq[i]
        });
        Ok((freqs.mapv(f32::cos), freqs.mapv(f32::sin)))
    }

    /// Rotate `x` (`(..., seq_len, dim)`) as if its first row sat at position `offset`.
    pub fn rotate<S, D>(&self, x: &ArrayBase<S, D>, offset: usize) -> Result<Array<f32, D>>
    where
        S: Data<Elem = f32>,
        D: Dimension + RemoveAxis,
    {
        let seq_len = sequence_axis_len(x.shape())?;
        let width = x.shape()[x.ndim() - 1];
        ensure_shape!(
            width == self.dim,
            "feature width {} does not match rotary dimension {}",
            width,
            self.dim
        );
        let (cos, sin) = self.angles_for_positions(offset, seq_len)?;
        apply_rotation(x, &cos, &sin)
    }
}

fn sequence_axis_len(shape: &[usize]) -> Result<usize> {
    ensure_shape!(
        shape.len() >= 2,
        "cannot infer sequence length from an array of shape {:?}; expected at least 2 axes",
        shape
    );
    Ok(shape[shape.len() - 2])
}

/// Rotate the two halves of `x`'s last axis by the angles encoded in `cos` / `sin`.
///
/// With `x1 = x[..., :k]` and `x2 = x[..., k:]` the result is
/// `concat(x1 * cos - x2 * sin, x1 * sin + x2 * cos)`. `cos` and `sin` are
/// broadcast (trailing axes aligned) against the shape of `x1`, so a
/// `(seq_len, k)` table applies to every batch and head in front of it.
pub fn apply_rotation<S, D, C1, E1, C2, E2>(
    x: &ArrayBase<S, D>,
    cos: &ArrayBase<C1, E1>,
    sin: &ArrayBase<C2, E2>,
) -> Result<Array<f32, D>>
where
    S: Data<Elem = f32>,
    D: Dimension + RemoveAxis,
    C1: Data<Elem = f32>,
    E1: Dimension,
    C2: Data<Elem = f32>,
    E2: Dimension,
{
    ensure_shape!(x.ndim() > 0, "cannot rotate a zero-dimensional array");
    let last = Axis(x.ndim() - 1);
    let width = x.len_of(last);
    ensure_shape!(
        width % 2 == 0,
        "rotated axis must have even length, got {}",
        width
    );
    let half = width / 2;

    let x1 = x.slice_axis(last, Slice::from(..half));
    let x2 = x.slice_axis(last, Slice::from(half..));

    let cos = cos.broadcast(x1.raw_dim()).ok_or_else(|| {
        Error::shape(format!(
            "cos table of shape {:?} cannot broadcast to {:?}",
            cos.shape(),
            x1.shape()
        ))
    })?;
    let sin = sin.broadcast(x1.raw_dim()).ok_or_else(|| {
        Error::shape(format!(
            "sin table of shape {:?} cannot broadcast to {:?}",
            sin.shape(),
            x1.shape()
        ))
    })?;

    let rotated_first = &x1 * &cos - &x2 * &sin;
    let rotated_second = &x1 * &sin + &x2 * &cos;

    concatenate(last, &[rotated_first.view(), rotated_second.view()])
        .map_err(|err| Error::shape(format!("failed to join rotated halves: {}", err)))
}
