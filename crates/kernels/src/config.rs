//! Kernel configuration structures.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatmulProblem {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl MatmulProblem {
    pub fn new(m: usize, n: usize, k: usize) -> Self {
        Self { m, n, k }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationKind {
    #[default]
    None,
    Relu,
    Gelu,
    Silu,
}
