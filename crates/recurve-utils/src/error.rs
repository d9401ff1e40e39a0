/// Errors returned by fallible `Tensor` constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    ShapeOverflow {
        dims: Vec<usize>,
    },
    LenMismatch {
        len: usize,
        expected: usize,
    },
    /// Backing storage could not be reserved.
    AllocFailed {
        elements: usize,
    },
}

impl std::fmt::Display for TensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TensorError::ShapeOverflow { dims } => {
                write!(f, "shape overflow for dimensions {:?}", dims)
            }
            TensorError::LenMismatch { len, expected } => {
                write!(f, "length mismatch: got {}, expected {}", len, expected)
            }
            TensorError::AllocFailed { elements } => {
                write!(f, "failed to reserve storage for {} elements", elements)
            }
        }
    }
}

impl std::error::Error for TensorError {}
