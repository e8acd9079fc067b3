//! Ingot - dense typed tensors with NumPy-style broadcasting
//!
//! Features:
//! - Row-major tensors over eleven dtypes (two float widths, signed and
//!   unsigned integers at four widths, bool)
//! - Owned storage and non-owning views with detected use-after-release
//! - Broadcast compatibility, output shape and stride-0 broadcast strides
//! - Broadcast materialization and dtype-dispatched elementwise kernels,
//!   into fresh or caller-supplied destinations
//!
//! Recoverable conditions (shapes that do not broadcast, a destination of the
//! wrong shape or dtype) come back as [`IngotError`]. Misuse of the library
//! (malformed tensors, mixed operand dtypes, an operator the dtype cannot
//! evaluate) panics with a `contract violation:` message.
//!
//! ```
//! use ingot::{Tensor, ElewOp, elementwise_broadcast};
//!
//! let a = Tensor::from_vec(vec![1.0f32, 2.0], (2, 1)).unwrap();
//! let b = Tensor::from_vec(vec![10.0f32, 20.0, 30.0], (1, 3)).unwrap();
//! let c = elementwise_broadcast(&a, &b, ElewOp::Sum).unwrap();
//! assert_eq!(c.dims(), &[2, 3]);
//! assert_eq!(c.to_vec_as::<f32>(), vec![11.0, 21.0, 31.0, 12.0, 22.0, 32.0]);
//! ```

pub mod config;
pub mod error;
pub mod ops;
pub mod tensor;

pub use error::{IngotError, IngotResult};
pub use ops::{
    broadcast_shape, broadcast_strides, broadcast_to, broadcast_to_into, elementwise,
    elementwise_broadcast, elementwise_broadcast_into, elementwise_into, elementwise_scalar,
    elementwise_scalar_into, is_broadcastable, try_broadcast_shape, BroadcastStrides,
};
pub use tensor::{DType, Element, ElewOp, Ownership, Shape, Tensor, MAX_RANK};

/// Install a `tracing` subscriber writing to stdout. Safe to call repeatedly.
pub fn init() -> IngotResult<()> {
    let _ = tracing_subscriber::fmt::try_init();
    tracing::info!("Ingot initialized");
    Ok(())
}

/// Get the current crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
