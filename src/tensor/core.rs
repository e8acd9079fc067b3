//! Core tensor type: dtype, shape and owned-or-borrowed storage

use std::fmt::{self, Debug};

use crate::error::{ErrorContext, IngotError, IngotResult, WithContext};
use super::dispatch;
use super::dtype::{DType, Element, Scalar};
use super::shape::{Shape, MAX_RANK};
use super::storage::{Ownership, StorageHandle, TensorStorage};

/// Dense, row-major, dynamically typed tensor.
///
/// A tensor either owns its storage or is a view onto another tensor's
/// storage. Views never free the bytes they look at; the owner must outlive
/// every view created from it. Reading through a view after its owner was
/// released panics instead of touching freed memory.
///
/// `Tensor` deliberately does not implement `Clone`: a second handle to the
/// same bytes is a [`view`](Tensor::view), a second copy is
/// [`clone_owned`](Tensor::clone_owned).
pub struct Tensor {
    dtype: DType,
    shape: Shape,
    storage: TensorStorage,
}

impl Tensor {
    /// Allocate a self-owned, zero-filled tensor
    pub fn zeros(shape: impl Into<Shape>, dtype: DType) -> IngotResult<Self> {
        let shape = shape.into();
        let size = shape.byte_size(dtype)?;
        tracing::debug!("Allocating {} tensor {} ({} bytes)", dtype, shape, size);
        Ok(Self {
            dtype,
            shape,
            storage: TensorStorage::zeroed(size),
        })
    }

    /// Wrap externally supplied bytes; the tensor takes ownership of them
    pub fn from_bytes(data: Vec<u8>, shape: impl Into<Shape>, dtype: DType) -> IngotResult<Self> {
        let shape = shape.into();
        let expected = shape.byte_size(dtype)?;
        if data.len() != expected {
            return Err(IngotError::ElementCount {
                shape,
                dtype,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            dtype,
            shape,
            storage: TensorStorage::from_vec(data),
        })
    }

    pub fn from_vec<T: Element>(data: Vec<T>, shape: impl Into<Shape>) -> IngotResult<Self> {
        Self::from_slice(&data, shape)
    }

    pub fn from_slice<T: Element>(data: &[T], shape: impl Into<Shape>) -> IngotResult<Self> {
        let size = T::DTYPE.size();
        let mut bytes = vec![0u8; data.len() * size];
        for (chunk, &value) in bytes.chunks_exact_mut(size).zip(data) {
            value.write_to(chunk);
        }
        Self::from_bytes(bytes, shape, T::DTYPE)
    }

    /// Values `start, start + step, ...` up to but excluding `stop`.
    pub fn arange(start: f64, stop: f64, step: f64, dtype: DType) -> IngotResult<Self> {
        if step == 0.0 || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
            return Err(IngotError::InvalidShape(format!(
                "arange({}, {}, {}) has no well-defined length",
                start, stop, step
            )));
        }
        let len = ((stop - start) / step).ceil();
        if len < 1.0 {
            return Err(IngotError::InvalidShape(format!(
                "arange({}, {}, {}) is empty",
                start, stop, step
            )));
        }
        let tensor = Self::zeros(len as usize, dtype)?;
        {
            let handle = tensor.storage.handle();
            let mut data = handle.write();
            let write = dtype.info().write_scalar;
            for (i, chunk) in data.chunks_exact_mut(dtype.size()).enumerate() {
                write(Scalar::Float(start + step * i as f64), chunk);
            }
        }
        Ok(tensor)
    }

    /// Non-owning view with the same shape and dtype
    pub fn view(&self) -> Self {
        Self {
            dtype: self.dtype,
            shape: self.shape.clone(),
            storage: self.storage.view(),
        }
    }

    /// Non-owning view reinterpreting the storage with another shape of the
    /// same element count
    pub fn view_as(&self, shape: impl Into<Shape>) -> IngotResult<Self> {
        let shape = shape.into();
        shape.validate()?;
        if shape.elem_count() != self.numel() {
            let result: IngotResult<()> = Err(IngotError::shape_error(
                &format!("{} elements", self.numel()),
                &format!("shape {} with {} elements", shape, shape.elem_count()),
                None,
            ));
            result.with_context(|| {
                ErrorContext::new("view_as")
                    .with_shape(self.shape())
                    .with_shape(&shape)
            })?;
        }
        Ok(Self {
            dtype: self.dtype,
            shape,
            storage: self.storage.view(),
        })
    }

    /// Deep copy into a new self-owned tensor
    pub fn clone_owned(&self) -> Self {
        let data = self.with_data(|bytes| bytes.to_vec());
        Self {
            dtype: self.dtype,
            shape: self.shape.clone(),
            storage: TensorStorage::from_vec(data),
        }
    }

    /// Stack `times` copies along a new leading axis
    pub fn repeat(&self, times: usize) -> IngotResult<Self> {
        let mut dims = Vec::with_capacity(self.rank() + 1);
        dims.push(times);
        dims.extend_from_slice(self.dims());
        let shape = Shape::new(dims);
        shape.byte_size(self.dtype)?;
        let data = self.with_data(|bytes| bytes.repeat(times));
        Self::from_bytes(data, shape, self.dtype)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Number of elements
    pub fn numel(&self) -> usize {
        self.shape.elem_count()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.numel() * self.dtype.size()
    }

    pub fn ownership(&self) -> Ownership {
        self.storage.ownership()
    }

    pub fn is_view(&self) -> bool {
        self.ownership() == Ownership::View
    }

    /// False for a view whose owner has been released
    pub fn is_alive(&self) -> bool {
        self.storage.is_alive()
    }

    pub fn storage(&self) -> &TensorStorage {
        &self.storage
    }

    pub(crate) fn handle(&self) -> StorageHandle {
        self.storage.handle()
    }

    pub fn is_same_shape(&self, other: &Tensor) -> bool {
        self.shape == other.shape
    }

    pub fn is_broadcastable(&self, other: &Tensor) -> bool {
        crate::ops::broadcast::is_broadcastable(&self.shape, &other.shape)
    }

    /// Linear index of `coords`
    pub fn index(&self, coords: &[usize]) -> usize {
        self.shape.index_of(coords)
    }

    /// Coordinates of linear index `index`
    pub fn coords(&self, index: usize) -> Vec<usize> {
        assert!(
            index < self.numel(),
            "contract violation: index {} out of range for {} elements",
            index,
            self.numel()
        );
        let mut coords = vec![0; self.rank()];
        self.shape.coords_of(index, &mut coords);
        coords
    }

    /// Run `f` over the raw bytes under a read lock
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let handle = self.storage.handle();
        let data = handle.read_recursive();
        f(&data[..self.size_in_bytes()])
    }

    /// Overwrite every element with `data` in one step.
    pub(crate) fn commit(&mut self, data: &[u8]) {
        let len = self.size_in_bytes();
        assert_eq!(
            data.len(),
            len,
            "contract violation: committing {} bytes into a {} byte tensor",
            data.len(),
            len
        );
        let handle = self.storage.handle();
        handle.write()[..len].copy_from_slice(data);
    }

    /// Element `index` converted to `T`
    pub fn get_as<T: Element>(&self, index: usize) -> T {
        assert!(
            index < self.numel(),
            "contract violation: index {} out of range for {} elements",
            index,
            self.numel()
        );
        let size = self.dtype.size();
        let mut out = vec![0u8; T::DTYPE.size()];
        self.with_data(|bytes| {
            dispatch::convert(&mut out, T::DTYPE, &bytes[index * size..(index + 1) * size], self.dtype)
        });
        T::read_from(&out)
    }

    /// Store `value`, converted to this tensor's dtype, at element `index`
    pub fn set_from<T: Element>(&mut self, index: usize, value: T) {
        assert!(
            index < self.numel(),
            "contract violation: index {} out of range for {} elements",
            index,
            self.numel()
        );
        let size = self.dtype.size();
        let mut src = vec![0u8; T::DTYPE.size()];
        value.write_to(&mut src);
        let handle = self.storage.handle();
        let mut data = handle.write();
        dispatch::convert(&mut data[index * size..(index + 1) * size], self.dtype, &src, T::DTYPE);
    }

    /// All elements converted to `T`
    pub fn to_vec_as<T: Element>(&self) -> Vec<T> {
        let mut out = vec![0u8; self.numel() * T::DTYPE.size()];
        self.with_data(|bytes| dispatch::convert_buffer(&mut out, T::DTYPE, bytes, self.dtype));
        out.chunks_exact(T::DTYPE.size()).map(T::read_from).collect()
    }

    /// Release the descriptor only. An owner hands its bytes back to the
    /// caller; a view returns `None` and leaves the owner untouched.
    pub fn release(self) -> Option<Vec<u8>> {
        tracing::trace!("Releasing {:?} descriptor {}", self.ownership(), self.shape);
        self.storage.into_bytes()
    }

    /// Release the descriptor and, when self-owned, the storage. Releasing a
    /// view never frees its owner's storage.
    pub fn release_with_storage(self) {
        tracing::trace!("Releasing {:?} tensor {} with storage", self.ownership(), self.shape);
        drop(self);
    }

    /// Abort on a tensor that breaks the structural invariants.
    pub(crate) fn check(&self) {
        assert!(
            self.rank() > 0 && self.rank() <= MAX_RANK,
            "contract violation: tensor rank {} is outside 1..={}",
            self.rank(),
            MAX_RANK
        );
        assert!(
            self.dims().iter().all(|&d| d > 0),
            "contract violation: tensor shape {} has a non-positive extent",
            self.shape
        );
        assert!(
            self.storage.is_alive(),
            "contract violation: tensor view accessed after its owner released the storage"
        );
        if crate::config::get_config().safety.verify_storage_len {
            let have = self.storage.size();
            assert!(
                have >= self.size_in_bytes(),
                "contract violation: tensor {} of {} needs {} bytes, storage has {}",
                self.shape,
                self.dtype,
                self.size_in_bytes(),
                have
            );
        }
    }
}

impl Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("dtype", &self.dtype)
            .field("ownership", &self.ownership())
            .field("numel", &self.numel())
            .finish()
    }
}
