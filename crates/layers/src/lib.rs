//! Transformer building blocks: rotary position embeddings and a SwiGLU feed-forward.
//!
//! - [`RotaryEmbedding`] precomputes inverse frequencies and produces per-position
//!   cos/sin tables; [`apply_rotation`] rotates query/key features with them.
//! - [`SwiGlu`] is the gated feed-forward sublayer built from three [`Linear`] maps.

pub mod config;
pub mod layer;
pub mod linear;
pub mod rope;
pub mod swiglu;

pub use blockforge_kernels::{Error, Result};
pub use config::{BlockConfig, FeedForwardConfig, RotaryConfig};
pub use layer::Layer;
pub use linear::Linear;
pub use rope::{apply_rotation, RotaryEmbedding};
pub use swiglu::SwiGlu;
