//! Process-wide dtype dispatch table.
//!
//! Each [`DType`] maps to one immutable [`DTypeInfo`] entry holding its byte
//! width, the monomorphized elementwise kernel and the scalar read/write
//! routines that make conversion between any two dtypes total. Entries are
//! looked up at call time and never mutated.

use std::fmt::{self, Display};

use super::dtype::{DType, Element, Scalar};

/// Binary elementwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElewOp {
    Mul,
    Div,
    Sum,
    Sub,
    Max,
    Min,
    Pow,
}

impl ElewOp {
    pub const ALL: [ElewOp; 7] = [
        ElewOp::Mul,
        ElewOp::Div,
        ElewOp::Sum,
        ElewOp::Sub,
        ElewOp::Max,
        ElewOp::Min,
        ElewOp::Pow,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            ElewOp::Mul => "mul",
            ElewOp::Div => "div",
            ElewOp::Sum => "sum",
            ElewOp::Sub => "sub",
            ElewOp::Max => "max",
            ElewOp::Min => "min",
            ElewOp::Pow => "pow",
        }
    }
}

impl Display for ElewOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw-byte elementwise kernel: reads one element from each input slice and
/// writes the result into `out`. Every slice is exactly one element wide.
pub type ElewFn = fn(&[u8], &[u8], &mut [u8], ElewOp);

/// Dispatch table entry for one dtype
pub struct DTypeInfo {
    pub dtype: DType,
    pub size: usize,
    pub elew: ElewFn,
    pub read_scalar: fn(&[u8]) -> Scalar,
    pub write_scalar: fn(Scalar, &mut [u8]),
    supports: fn(ElewOp) -> bool,
}

impl DTypeInfo {
    pub fn supports(&self, op: ElewOp) -> bool {
        (self.supports)(op)
    }
}

impl fmt::Debug for DTypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DTypeInfo")
            .field("dtype", &self.dtype)
            .field("size", &self.size)
            .finish()
    }
}

/// Typed operator semantics behind each table entry.
trait ElewKernel: Element {
    fn elew(a: Self, b: Self, op: ElewOp) -> Self;

    fn supports(_op: ElewOp) -> bool {
        true
    }
}

macro_rules! impl_float_kernel {
    ($t:ty) => {
        impl ElewKernel for $t {
            #[inline]
            fn elew(a: Self, b: Self, op: ElewOp) -> Self {
                match op {
                    ElewOp::Mul => a * b,
                    ElewOp::Div => a / b,
                    ElewOp::Sum => a + b,
                    ElewOp::Sub => a - b,
                    ElewOp::Max => a.max(b),
                    ElewOp::Min => a.min(b),
                    ElewOp::Pow => a.powf(b),
                }
            }
        }
    };
}

macro_rules! impl_int_kernel {
    ($t:ty) => {
        impl ElewKernel for $t {
            #[inline]
            fn elew(a: Self, b: Self, op: ElewOp) -> Self {
                match op {
                    ElewOp::Mul => a.wrapping_mul(b),
                    ElewOp::Div => {
                        assert!(
                            b != 0,
                            "contract violation: integer division by zero in {} elementwise div",
                            <$t as Element>::DTYPE
                        );
                        a.wrapping_div(b)
                    }
                    ElewOp::Sum => a.wrapping_add(b),
                    ElewOp::Sub => a.wrapping_sub(b),
                    ElewOp::Max => a.max(b),
                    ElewOp::Min => a.min(b),
                    ElewOp::Pow => Self::from_scalar(Scalar::Float((a as f64).powf(b as f64))),
                }
            }
        }
    };
}

impl_float_kernel!(f32);
impl_float_kernel!(f64);
impl_int_kernel!(i8);
impl_int_kernel!(i16);
impl_int_kernel!(i32);
impl_int_kernel!(i64);
impl_int_kernel!(u8);
impl_int_kernel!(u16);
impl_int_kernel!(u32);
impl_int_kernel!(u64);

impl ElewKernel for bool {
    #[inline]
    fn elew(a: Self, b: Self, op: ElewOp) -> Self {
        match op {
            ElewOp::Mul | ElewOp::Min => a && b,
            ElewOp::Sum | ElewOp::Max => a || b,
            ElewOp::Div | ElewOp::Sub | ElewOp::Pow => {
                panic!("contract violation: elementwise {} is not defined for bool", op)
            }
        }
    }

    fn supports(op: ElewOp) -> bool {
        matches!(op, ElewOp::Mul | ElewOp::Min | ElewOp::Sum | ElewOp::Max)
    }
}

fn elew_bytes<T: ElewKernel>(a: &[u8], b: &[u8], out: &mut [u8], op: ElewOp) {
    T::elew(T::read_from(a), T::read_from(b), op).write_to(out);
}

fn read_scalar<T: Element>(bytes: &[u8]) -> Scalar {
    T::read_from(bytes).to_scalar()
}

fn write_scalar<T: Element>(value: Scalar, bytes: &mut [u8]) {
    T::from_scalar(value).write_to(bytes);
}

macro_rules! entry {
    ($t:ty) => {
        DTypeInfo {
            dtype: <$t as Element>::DTYPE,
            size: <$t as Element>::DTYPE.size(),
            elew: elew_bytes::<$t>,
            read_scalar: read_scalar::<$t>,
            write_scalar: write_scalar::<$t>,
            supports: <$t as ElewKernel>::supports,
        }
    };
}

// Same order as `DType::ALL`
static DTYPE_TABLE: [DTypeInfo; 11] = [
    entry!(f32),
    entry!(f64),
    entry!(i8),
    entry!(i16),
    entry!(i32),
    entry!(i64),
    entry!(u8),
    entry!(u16),
    entry!(u32),
    entry!(u64),
    entry!(bool),
];

impl DType {
    /// Dispatch table entry for this dtype.
    #[inline]
    pub fn info(&self) -> &'static DTypeInfo {
        &DTYPE_TABLE[self.ordinal()]
    }

    pub fn supports(&self, op: ElewOp) -> bool {
        self.info().supports(op)
    }
}

/// Kernel for `dtype`, panicking when the dtype cannot evaluate `op`.
pub fn elew_kernel(dtype: DType, op: ElewOp) -> ElewFn {
    let info = dtype.info();
    assert!(
        info.supports(op),
        "contract violation: elementwise {} is not supported for dtype {}",
        op,
        dtype
    );
    info.elew
}

/// Convert one element between any two dtypes.
///
/// `dst` and `src` must be exactly one element of their dtype wide.
#[inline]
pub fn convert(dst: &mut [u8], dst_dtype: DType, src: &[u8], src_dtype: DType) {
    if dst_dtype == src_dtype {
        dst.copy_from_slice(src);
        return;
    }
    let value = (src_dtype.info().read_scalar)(src);
    (dst_dtype.info().write_scalar)(value, dst);
}

/// Convert a whole buffer element by element.
pub fn convert_buffer(dst: &mut [u8], dst_dtype: DType, src: &[u8], src_dtype: DType) {
    let (ds, ss) = (dst_dtype.size(), src_dtype.size());
    assert_eq!(
        dst.len() / ds,
        src.len() / ss,
        "contract violation: converting {} {} elements into room for {} {} elements",
        src.len() / ss,
        src_dtype,
        dst.len() / ds,
        dst_dtype
    );
    if dst_dtype == src_dtype {
        dst.copy_from_slice(src);
        return;
    }
    for (d, s) in dst.chunks_exact_mut(ds).zip(src.chunks_exact(ss)) {
        convert(d, dst_dtype, s, src_dtype);
    }
}
