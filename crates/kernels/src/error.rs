//! Error types shared by the kernels and the layers built on top of them.

/// Result alias used across blockforge crates.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A layer or table was constructed with invalid hyperparameters.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// An input array does not have the shape an operation requires.
    #[error("shape error: {reason}")]
    Shape { reason: String },

    /// A JSON configuration document could not be parsed.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn shape(reason: impl Into<String>) -> Self {
        Self::Shape {
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Shape { .. })
    }
}

/// Return early with [`Error::Shape`] unless the condition holds.
#[macro_export]
macro_rules! ensure_shape {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::shape(format!($($arg)+)));
        }
    };
}

/// Return early with [`Error::Configuration`] unless the condition holds.
#[macro_export]
macro_rules! ensure_config {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::configuration(format!($($arg)+)));
        }
    };
}
