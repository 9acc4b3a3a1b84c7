//! Kernel primitives backing the blockforge layers.

pub mod activation;
pub mod config;
pub mod error;
pub mod matmul;
pub mod registry;
pub mod utils;

pub use activation::*;
pub use config::*;
pub use error::{Error, Result};
pub use matmul::*;
pub use registry::*;
pub use utils::*;
