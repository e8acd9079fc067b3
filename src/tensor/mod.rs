//! Tensor data model
//!
//! - [`Shape`]: rank and per-axis extents, row-major index arithmetic
//! - [`DType`] and [`Element`]: element representations and the Rust types behind them
//! - dispatch table: byte width, typed elementwise kernel and conversion per dtype
//! - [`TensorStorage`]: owned bytes or a non-owning view of another tensor's bytes

pub mod core;
pub mod dispatch;
pub mod dtype;
pub mod shape;
pub mod storage;

// Re-export main types for convenience
pub use self::core::Tensor;
pub use dispatch::{convert, convert_buffer, elew_kernel, DTypeInfo, ElewFn, ElewOp};
pub use dtype::{DType, Element, Scalar};
pub use shape::{Shape, MAX_RANK};
pub use storage::{Ownership, StorageHandle, TensorStorage};
