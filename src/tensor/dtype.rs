//! Element data types and the scalar bridge between them

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Element representation of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

impl DType {
    /// Every supported dtype, in dispatch-table order.
    pub const ALL: [DType; 11] = [
        DType::F32,
        DType::F64,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::Bool,
    ];

    /// Get the size in bytes of this data type
    pub const fn size(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
            DType::I8 => 1,
            DType::I16 => 2,
            DType::I32 => 4,
            DType::I64 => 8,
            DType::U8 => 1,
            DType::U16 => 2,
            DType::U32 => 4,
            DType::U64 => 8,
            DType::Bool => 1,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::Bool => "bool",
        }
    }

    /// Position of this dtype in [`DType::ALL`] and the dispatch table.
    pub(crate) const fn ordinal(&self) -> usize {
        match self {
            DType::F32 => 0,
            DType::F64 => 1,
            DType::I8 => 2,
            DType::I16 => 3,
            DType::I32 => 4,
            DType::I64 => 5,
            DType::U8 => 6,
            DType::U16 => 7,
            DType::U32 => 8,
            DType::U64 => 9,
            DType::Bool => 10,
        }
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Widest representation of any element value.
///
/// Every integer dtype fits in `i128`, so conversions only lose information
/// where the target type cannot hold the value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Float(f64),
    Int(i128),
    Bool(bool),
}

/// Rust types that can be stored as tensor elements.
pub trait Element: Copy + Send + Sync + fmt::Debug + 'static {
    const DTYPE: DType;

    /// Read one element from exactly `DTYPE.size()` native-endian bytes.
    fn read_from(bytes: &[u8]) -> Self;

    /// Write one element into exactly `DTYPE.size()` bytes.
    fn write_to(self, bytes: &mut [u8]);

    fn to_scalar(self) -> Scalar;

    /// Total conversion: integers saturate, floats truncate toward zero when
    /// narrowed to an integer (NaN becomes 0), nonzero becomes `true`.
    fn from_scalar(value: Scalar) -> Self;
}

macro_rules! impl_float_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            #[inline]
            fn read_from(bytes: &[u8]) -> Self {
                bytemuck::pod_read_unaligned(bytes)
            }

            #[inline]
            fn write_to(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(bytemuck::bytes_of(&self));
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Float(self as f64)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Float(v) => v as $t,
                    Scalar::Int(v) => v as $t,
                    Scalar::Bool(b) => if b { 1.0 } else { 0.0 },
                }
            }
        }
    };
}

macro_rules! impl_int_element {
    ($t:ty, $dtype:expr) => {
        impl Element for $t {
            const DTYPE: DType = $dtype;

            #[inline]
            fn read_from(bytes: &[u8]) -> Self {
                bytemuck::pod_read_unaligned(bytes)
            }

            #[inline]
            fn write_to(self, bytes: &mut [u8]) {
                bytes.copy_from_slice(bytemuck::bytes_of(&self));
            }

            #[inline]
            fn to_scalar(self) -> Scalar {
                Scalar::Int(self as i128)
            }

            #[inline]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    // `as` from float saturates and maps NaN to 0
                    Scalar::Float(v) => v as $t,
                    Scalar::Int(v) => v.clamp(<$t>::MIN as i128, <$t>::MAX as i128) as $t,
                    Scalar::Bool(b) => b as $t,
                }
            }
        }
    };
}

impl_float_element!(f32, DType::F32);
impl_float_element!(f64, DType::F64);
impl_int_element!(i8, DType::I8);
impl_int_element!(i16, DType::I16);
impl_int_element!(i32, DType::I32);
impl_int_element!(i64, DType::I64);
impl_int_element!(u8, DType::U8);
impl_int_element!(u16, DType::U16);
impl_int_element!(u32, DType::U32);
impl_int_element!(u64, DType::U64);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn read_from(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn write_to(self, bytes: &mut [u8]) {
        bytes[0] = self as u8;
    }

    #[inline]
    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    #[inline]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Float(v) => v != 0.0,
            Scalar::Int(v) => v != 0,
            Scalar::Bool(b) => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_features() {
        assert_eq!(DType::F64.to_string(), "f64");
        assert_eq!(DType::I16.size(), 2);
        assert_eq!(DType::Bool.size(), 1);
    }

    #[test]
    fn test_ordinals_match_all() {
        for (i, dtype) in DType::ALL.iter().enumerate() {
            assert_eq!(dtype.ordinal(), i);
        }
    }

    #[test]
    fn test_integer_narrowing_saturates() {
        assert_eq!(u8::from_scalar(300i32.to_scalar()), 255);
        assert_eq!(u8::from_scalar((-5i32).to_scalar()), 0);
        assert_eq!(i8::from_scalar(1000.7f64.to_scalar()), 127);
        assert_eq!(i16::from_scalar((-2.9f32).to_scalar()), -2);
        assert_eq!(u32::from_scalar(f64::NAN.to_scalar()), 0);
        assert_eq!(i64::from_scalar(u64::MAX.to_scalar()), i64::MAX);
    }

    #[test]
    fn test_bool_conversions() {
        assert!(bool::from_scalar(3u8.to_scalar()));
        assert!(!bool::from_scalar(0.0f32.to_scalar()));
        assert_eq!(f32::from_scalar(true.to_scalar()), 1.0);
        assert_eq!(u16::from_scalar(false.to_scalar()), 0);
    }

    #[test]
    fn test_unaligned_read_write() {
        let mut bytes = [0u8; 9];
        2.5f64.write_to(&mut bytes[1..9]);
        assert_eq!(f64::read_from(&bytes[1..9]), 2.5);
    }
}
