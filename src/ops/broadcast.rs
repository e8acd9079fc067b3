//! NumPy-style broadcasting.
//!
//! Shapes are aligned at their trailing axis and missing leading axes count
//! as extent 1. Two aligned extents are compatible when they are equal or
//! one of them is 1:
//!
//! ```text
//! [3, 1]    and [1, 4] -> [3, 4]
//! [5]       and [3, 5] -> [3, 5]
//! [2, 3, 4] and [4]    -> [2, 3, 4]
//! [3, 4]    and [2, 4] -> not broadcastable
//! ```
//!
//! An operand is replayed against the output shape through
//! [`BroadcastStrides`]: a stride of 0 means the operand is broadcast along
//! that axis, so the same source element is read for every coordinate on it.

use crate::error::{IngotError, IngotResult};
use crate::tensor::{DType, Shape, Tensor, MAX_RANK};
use super::recoverable;

/// Whether `a` and `b` can be broadcast together. Symmetric, never allocates.
pub fn is_broadcastable(a: &Shape, b: &Shape) -> bool {
    let rank = a.rank().max(b.rank());
    (0..rank).all(|i| {
        let (da, db) = (a.dim_from_right(i), b.dim_from_right(i));
        da == db || da == 1 || db == 1
    })
}

/// Output shape of broadcasting `a` against `b`.
///
/// Callers check [`is_broadcastable`] first; for incompatible shapes the
/// result is meaningless. Use [`try_broadcast_shape`] for a checked variant.
pub fn broadcast_shape(a: &Shape, b: &Shape) -> Shape {
    let rank = a.rank().max(b.rank());
    let mut dims = vec![0usize; rank];
    for i in 0..rank {
        dims[rank - 1 - i] = a.dim_from_right(i).max(b.dim_from_right(i));
    }
    Shape::new(dims)
}

pub fn try_broadcast_shape(a: &Shape, b: &Shape) -> IngotResult<Shape> {
    if !is_broadcastable(a, b) {
        return Err(IngotError::not_broadcastable(a, b));
    }
    Ok(broadcast_shape(a, b))
}

/// Per-output-axis element strides of one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastStrides {
    strides: [usize; MAX_RANK],
    rank: usize,
}

impl BroadcastStrides {
    pub fn as_slice(&self) -> &[usize] {
        &self.strides[..self.rank]
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Source element offset for output coordinates `coords`.
    #[inline]
    pub fn offset(&self, coords: &[usize]) -> usize {
        debug_assert_eq!(coords.len(), self.rank);
        coords
            .iter()
            .zip(&self.strides[..self.rank])
            .map(|(&c, &s)| c * s)
            .sum()
    }
}

/// Strides that map coordinates of `out` back onto a row-major `src`.
///
/// Leading output axes with no counterpart in `src` get stride 0. Aligned
/// axes get the row-major stride of `src` when the extents match, or 0 when
/// `src` has extent 1 there; the running product always follows the extents
/// of `src`, never those of `out`.
///
/// # Panics
///
/// When `src` has more axes than `out`, or an aligned extent of `src` is
/// neither 1 nor the output extent. Callers establish compatibility first.
pub fn broadcast_strides(src: &Shape, out: &Shape) -> BroadcastStrides {
    assert!(
        out.rank() <= MAX_RANK && src.rank() <= out.rank(),
        "contract violation: cannot derive strides of rank {} shape {} against rank {} shape {}",
        src.rank(),
        src,
        out.rank(),
        out
    );
    let mut strides = [0usize; MAX_RANK];
    let lead = out.rank() - src.rank();
    let mut running = 1;
    for axis in (0..src.rank()).rev() {
        let (s, o) = (src.dims()[axis], out.dims()[lead + axis]);
        if s == o {
            strides[lead + axis] = running;
        } else if s == 1 {
            strides[lead + axis] = 0;
        } else {
            panic!(
                "contract violation: extent {} of {} at axis {} cannot broadcast to {} of {}",
                s, src, axis, o, out
            );
        }
        running *= s;
    }
    BroadcastStrides {
        strides,
        rank: out.rank(),
    }
}

/// Check that `src` can be broadcast to `target` on its own, i.e. every
/// aligned source extent is 1 or equal to the target extent, and that a
/// `dtype` tensor of `target` is addressable.
fn check_target(src: &Shape, target: &Shape, dtype: DType) -> IngotResult<()> {
    target.byte_size(dtype)?;
    if src.rank() > target.rank() {
        return Err(IngotError::not_broadcastable(src, target));
    }
    let lead = target.rank() - src.rank();
    for (axis, &s) in src.dims().iter().enumerate() {
        let t = target.dims()[lead + axis];
        if s != 1 && s != t {
            return Err(IngotError::BroadcastTarget {
                source_shape: src.clone(),
                target: target.clone(),
                dim: lead + axis,
                from: s,
                to: t,
            });
        }
    }
    Ok(())
}

/// Replay `src` through its broadcast strides into a fresh buffer of `target`.
fn materialize(src: &Tensor, target: &Shape) -> Vec<u8> {
    let size = src.dtype().size();
    let strides = broadcast_strides(src.shape(), target);
    let mut out = vec![0u8; target.elem_count() * size];
    let mut coords = [0usize; MAX_RANK];
    let coords = &mut coords[..target.rank()];

    src.with_data(|data| {
        for (i, dst) in out.chunks_exact_mut(size).enumerate() {
            target.coords_of(i, coords);
            let s = strides.offset(coords) * size;
            dst.copy_from_slice(&data[s..s + size]);
        }
    });
    out
}

/// Broadcast `src` into a newly allocated tensor of shape `target`.
pub fn broadcast_to(src: &Tensor, target: impl Into<Shape>) -> IngotResult<Tensor> {
    src.check();
    let target = target.into();
    check_target(src.shape(), &target, src.dtype()).map_err(recoverable)?;

    tracing::debug!("Broadcasting {} {} to {}", src.dtype(), src.shape(), target);
    let data = materialize(src, &target);
    Tensor::from_bytes(data, target, src.dtype())
}

/// Broadcast `src` to shape `target`, writing into the caller-supplied `dst`.
///
/// `dst` must already have shape `target` and the dtype of `src`. On error
/// `dst` is left untouched. `dst` may share storage with `src`.
pub fn broadcast_to_into(src: &Tensor, target: impl Into<Shape>, dst: &mut Tensor) -> IngotResult<()> {
    src.check();
    dst.check();
    let target = target.into();
    check_target(src.shape(), &target, src.dtype()).map_err(recoverable)?;
    if dst.shape() != &target {
        return Err(recoverable(IngotError::destination_shape(&target, dst.shape())));
    }
    if dst.dtype() != src.dtype() {
        return Err(recoverable(IngotError::DestinationDType {
            expected: src.dtype(),
            got: dst.dtype(),
        }));
    }

    tracing::debug!("Broadcasting {} {} into destination {}", src.dtype(), src.shape(), target);
    let data = materialize(src, &target);
    dst.commit(&data);
    Ok(())
}

impl Tensor {
    /// See [`broadcast_to`].
    pub fn broadcast_to(&self, target: impl Into<Shape>) -> IngotResult<Tensor> {
        broadcast_to(self, target)
    }
}
