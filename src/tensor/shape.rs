//! Tensor shapes and row-major index arithmetic

use std::fmt::{self, Display};

use crate::error::{IngotError, IngotResult};
use super::dtype::DType;

/// Largest rank a tensor may have.
pub const MAX_RANK: usize = 8;

/// Per-axis extents of a tensor, axis 0 outermost.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Wrap extents without validation. Tensor constructors validate.
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Wrap extents, rejecting rank 0, rank above [`MAX_RANK`], zero extents
    /// and element counts that overflow `usize`.
    pub fn new_validated(dims: Vec<usize>) -> IngotResult<Self> {
        let shape = Self { dims };
        shape.validate()?;
        Ok(shape)
    }

    pub fn validate(&self) -> IngotResult<()> {
        if self.dims.is_empty() || self.dims.len() > MAX_RANK {
            return Err(IngotError::InvalidShape(format!(
                "rank {} of shape {} is outside 1..={}",
                self.dims.len(),
                self,
                MAX_RANK
            )));
        }
        if let Some(axis) = self.dims.iter().position(|&d| d == 0) {
            return Err(IngotError::InvalidShape(format!(
                "extent at axis {} of shape {} must be positive",
                axis, self
            )));
        }
        if self.checked_elem_count().is_none() {
            return Err(IngotError::InvalidShape(format!(
                "element count of shape {} overflows usize",
                self
            )));
        }
        Ok(())
    }

    /// Validate, then return the byte length of a `dtype` tensor of this shape.
    pub fn byte_size(&self, dtype: DType) -> IngotResult<usize> {
        self.validate()?;
        self.elem_count().checked_mul(dtype.size()).ok_or_else(|| {
            IngotError::InvalidShape(format!(
                "byte size of {} shape {} overflows usize",
                dtype, self
            ))
        })
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Number of elements (product of extents), or `None` on overflow.
    pub fn checked_elem_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Number of elements (product of extents).
    ///
    /// # Panics
    ///
    /// When the product overflows; validated shapes never do.
    pub fn elem_count(&self) -> usize {
        self.checked_elem_count().unwrap_or_else(|| {
            panic!("contract violation: element count of shape {} overflows usize", self)
        })
    }

    /// Extent at `i` positions from the right, or the implicit 1 past the
    /// leftmost axis.
    #[inline]
    pub fn dim_from_right(&self, i: usize) -> usize {
        if i < self.dims.len() {
            self.dims[self.dims.len() - 1 - i]
        } else {
            1
        }
    }

    /// Row-major strides in elements: `[2, 3, 4]` gives `[12, 4, 1]`.
    pub fn contiguous_strides(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.rank()];
        let mut running = 1;
        for axis in (0..self.rank()).rev() {
            strides[axis] = running;
            running *= self.dims[axis];
        }
        strides
    }

    /// Linear row-major index of `coords`.
    pub fn index_of(&self, coords: &[usize]) -> usize {
        assert_eq!(
            coords.len(),
            self.rank(),
            "contract violation: {} coordinates for a rank {} shape",
            coords.len(),
            self.rank()
        );
        let mut index = 0;
        for (axis, (&c, &d)) in coords.iter().zip(&self.dims).enumerate() {
            assert!(
                c < d,
                "contract violation: coordinate {} out of range for axis {} of extent {}",
                c,
                axis,
                d
            );
            index = index * d + c;
        }
        index
    }

    /// Decode a linear index into `coords` (which must hold `rank()` slots).
    #[inline]
    pub fn coords_of(&self, mut index: usize, coords: &mut [usize]) {
        for axis in (0..self.rank()).rev() {
            let d = self.dims[axis];
            coords[axis] = index % d;
            index /= d;
        }
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.dims.iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", "))
    }
}

impl From<usize> for Shape {
    fn from(d: usize) -> Self {
        Shape::new(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape::new(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape::new(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape::new(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape::new(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims.to_vec())
    }
}
