use crate::{Shape, Strides, TensorError};
use num_traits::Zero;
use std::fmt::Debug;

/// Dense row-major tensor over one contiguous `Vec`.
///
/// The kernels in this workspace address the backing slice directly with
/// offsets derived from the shape (step, row, and gate strides), so this
/// type stays deliberately small: validated construction, shape queries,
/// and flat data access. Anything fancier lives at the call sites.
#[derive(Default, Clone, PartialEq)]
pub struct Tensor<T> {
    data: Vec<T>,
    shape: Shape,
    strides: Strides,
}

impl<T> Tensor<T> {
    /// Wrap `data` in `shape`. Panics when the element count and the
    /// shape disagree; prefer [Tensor::try_new] at trust boundaries.
    ///
    /// ```rust
    /// use recurve_utils::Tensor;
    ///
    /// // A [seq, batch, feature] buffer of two steps.
    /// let x = Tensor::new(vec![1.0f32, 2.0, 3.0, 4.0], (2, 1, 2));
    /// assert_eq!(x.dims(), &[2, 1, 2]);
    /// assert_eq!(x.strides().as_slice(), &[2, 2, 1]);
    /// ```
    pub fn new(data: Vec<T>, shape: impl Into<Shape>) -> Self {
        match Self::try_new(data, shape) {
            Ok(tensor) => tensor,
            Err(err) => panic!("Tensor::new: {}", err),
        }
    }

    /// Fallible [Tensor::new]: reports impossible shapes and element-count
    /// mismatches instead of panicking.
    pub fn try_new(data: Vec<T>, shape: impl Into<Shape>) -> Result<Self, TensorError> {
        let shape = shape.into();
        let expected = shape.try_size().ok_or_else(|| TensorError::ShapeOverflow {
            dims: shape.as_slice().to_vec(),
        })?;

        if data.len() != expected {
            return Err(TensorError::LenMismatch {
                len: data.len(),
                expected,
            });
        }

        let strides = Strides::from(&shape);

        Ok(Self {
            data,
            shape,
            strides,
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Shorthand for `tensor.shape().as_slice()`.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        self.shape.as_slice()
    }

    /// Size of one dimension. Panics when `index >= rank`.
    #[inline]
    pub fn dim_at(&self, index: usize) -> usize {
        self.shape.dim_at(index)
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    /// The backing storage as a flat row-major slice.
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Zero + Clone> Tensor<T> {
    /// Zero-filled tensor; panics on impossible shapes.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        match Self::try_zeros(shape) {
            Ok(tensor) => tensor,
            Err(err) => panic!("Tensor::zeros: {}", err),
        }
    }

    /// Zero-filled tensor with a fallible reservation of the backing
    /// storage, so scratch-buffer allocation failures can be reported
    /// instead of aborting.
    pub fn try_zeros(shape: impl Into<Shape>) -> Result<Self, TensorError> {
        let shape = shape.into();
        let n = shape.try_size().ok_or_else(|| TensorError::ShapeOverflow {
            dims: shape.as_slice().to_vec(),
        })?;

        let mut data = Vec::new();
        data.try_reserve_exact(n)
            .map_err(|_| TensorError::AllocFailed { elements: n })?;
        data.resize(n, T::zero());

        Self::try_new(data, shape)
    }
}

impl<T: Debug> Debug for Tensor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor(shape={:?}, strides={:?}, data={:?})",
            self.shape.as_slice(),
            self.strides.as_slice(),
            self.data
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_major_buffer_has_row_major_strides() {
        // [S=2, B=3, H=4]
        let y = Tensor::<f32>::zeros((2, 3, 4));

        assert_eq!(y.rank(), 3);
        assert_eq!(y.dim_at(1), 3);
        assert_eq!(y.strides().as_slice(), &[12, 4, 1]);
        assert_eq!(y.len(), 24);
        assert!(y.data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn try_new_reports_length_mismatch() {
        let err = Tensor::try_new(vec![0.0f32; 5], (2, 3)).unwrap_err();
        assert_eq!(err, TensorError::LenMismatch { len: 5, expected: 6 });
    }

    #[test]
    fn try_new_reports_shape_overflow() {
        let err = Tensor::try_new(Vec::<f32>::new(), vec![usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, TensorError::ShapeOverflow { .. }));
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn new_panics_on_length_mismatch() {
        let _ = Tensor::new(vec![1i32, 2, 3], (2, 2));
    }

    #[test]
    fn try_zeros_rejects_overflowing_shapes() {
        let err = Tensor::<f32>::try_zeros(vec![usize::MAX, 4]).unwrap_err();
        assert!(matches!(err, TensorError::ShapeOverflow { .. }));
    }

    #[test]
    fn data_mut_writes_through_to_the_backing_slice() {
        let mut state = Tensor::<f32>::zeros((2, 2));
        state.data_mut()[3] = 7.0;
        assert_eq!(state.data(), &[0.0, 0.0, 0.0, 7.0]);
    }
}
