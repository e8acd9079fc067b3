//! Dtype-dispatched elementwise operations with broadcasting

use std::ops::{Add, Div, Mul, Sub};

use crate::error::{ErrorContext, IngotError, IngotResult, WithContext};
use crate::tensor::{elew_kernel, DType, ElewOp, Scalar, Shape, Tensor, MAX_RANK};
use super::broadcast::{broadcast_shape, broadcast_strides, is_broadcastable};
use super::recoverable;

/// Contract checks shared by every binary entry point.
fn check_operands(a: &Tensor, b: &Tensor, op: ElewOp) {
    a.check();
    b.check();
    assert!(
        a.dtype() == b.dtype(),
        "contract violation: elementwise {} between {} and {} operands",
        op,
        a.dtype(),
        b.dtype()
    );
    assert!(
        a.dtype().supports(op),
        "contract violation: elementwise {} is not supported for dtype {}",
        op,
        a.dtype()
    );
}

fn check_destination(dst: &Tensor, shape: &Shape, dtype: DType) -> IngotResult<()> {
    dst.check();
    if dst.shape() != shape {
        return Err(recoverable(IngotError::destination_shape(shape, dst.shape())));
    }
    if dst.dtype() != dtype {
        return Err(recoverable(IngotError::DestinationDType {
            expected: dtype,
            got: dst.dtype(),
        }));
    }
    Ok(())
}

/// Output shape of `a op b`, or the recoverable error when they do not
/// broadcast or the output would not be addressable.
fn output_shape(a: &Tensor, b: &Tensor) -> IngotResult<Shape> {
    if !is_broadcastable(a.shape(), b.shape()) {
        return Err(recoverable(IngotError::not_broadcastable(a.shape(), b.shape())));
    }
    let out = broadcast_shape(a.shape(), b.shape());
    out.byte_size(a.dtype()).map_err(recoverable)?;
    Ok(out)
}

/// Evaluate `a op b` over `out_shape` into a call-scoped buffer.
///
/// Coordinates are decoded once per output element; each operand turns them
/// into its own source offset through its own stride vector.
fn compute(a: &Tensor, b: &Tensor, out_shape: &Shape, op: ElewOp) -> Vec<u8> {
    let dtype = a.dtype();
    let size = dtype.size();
    let kernel = elew_kernel(dtype, op);
    let a_strides = broadcast_strides(a.shape(), out_shape);
    let b_strides = broadcast_strides(b.shape(), out_shape);

    if crate::config::get_config().diagnostics.trace_dispatch {
        tracing::trace!(
            "Dispatching {} {} over {}: strides {:?} and {:?}",
            dtype,
            op,
            out_shape,
            a_strides.as_slice(),
            b_strides.as_slice()
        );
    }

    let mut out = vec![0u8; out_shape.elem_count() * size];
    let mut coords = [0usize; MAX_RANK];
    let coords = &mut coords[..out_shape.rank()];

    // Recursive reads: `a` and `b` may be views of the same storage
    let (a_handle, b_handle) = (a.handle(), b.handle());
    let a_data = a_handle.read_recursive();
    let b_data = b_handle.read_recursive();

    for (i, dst) in out.chunks_exact_mut(size).enumerate() {
        out_shape.coords_of(i, coords);
        let ia = a_strides.offset(coords) * size;
        let ib = b_strides.offset(coords) * size;
        kernel(&a_data[ia..ia + size], &b_data[ib..ib + size], dst, op);
    }
    out
}

/// `op(a, b)` under broadcasting, into a newly allocated tensor.
///
/// Incompatible shapes are reported as [`IngotError::NotBroadcastable`] and
/// nothing is allocated.
///
/// # Panics
///
/// When the operands differ in dtype, the dtype cannot evaluate `op`, or an
/// operand is malformed (including a view whose owner was released).
pub fn elementwise_broadcast(a: &Tensor, b: &Tensor, op: ElewOp) -> IngotResult<Tensor> {
    check_operands(a, b, op);
    let out_shape = output_shape(a, b)?;

    tracing::debug!("Elementwise {} {} x {} -> new {}", op, a.shape(), b.shape(), out_shape);
    let data = compute(a, b, &out_shape, op);
    Tensor::from_bytes(data, out_shape, a.dtype())
}

/// `op(a, b)` under broadcasting, written into the caller-supplied `dst`.
///
/// Every element of `dst` is overwritten. On error `dst` is left untouched.
/// `dst` may share storage with either operand.
pub fn elementwise_broadcast_into(a: &Tensor, b: &Tensor, dst: &mut Tensor, op: ElewOp) -> IngotResult<()> {
    check_operands(a, b, op);
    let out_shape = output_shape(a, b)?;
    check_destination(dst, &out_shape, a.dtype())?;

    tracing::debug!("Elementwise {} {} x {} -> destination {}", op, a.shape(), b.shape(), out_shape);
    let data = compute(a, b, &out_shape, op);
    dst.commit(&data);
    Ok(())
}

fn require_same_shape(a: &Tensor, b: &Tensor, op: ElewOp) -> IngotResult<()> {
    if a.is_same_shape(b) {
        return Ok(());
    }
    let result: IngotResult<()> = Err(IngotError::shape_error(
        &a.shape().to_string(),
        &b.shape().to_string(),
        None,
    ));
    result
        .with_context(|| {
            ErrorContext::new(op.name())
                .with_shape(a.shape())
                .with_shape(b.shape())
                .with_suggestion("use elementwise_broadcast for operands of different shapes")
        })
        .map_err(recoverable)
}

/// `op(a, b)` for operands of identical shape.
pub fn elementwise(a: &Tensor, b: &Tensor, op: ElewOp) -> IngotResult<Tensor> {
    check_operands(a, b, op);
    require_same_shape(a, b, op)?;
    elementwise_broadcast(a, b, op)
}

pub fn elementwise_into(a: &Tensor, b: &Tensor, dst: &mut Tensor, op: ElewOp) -> IngotResult<()> {
    check_operands(a, b, op);
    require_same_shape(a, b, op)?;
    elementwise_broadcast_into(a, b, dst, op)
}

/// One-element tensor of `dtype` holding `param` converted through the
/// dispatch table.
fn scalar_operand(param: f64, dtype: DType) -> IngotResult<Tensor> {
    let mut bytes = vec![0u8; dtype.size()];
    (dtype.info().write_scalar)(Scalar::Float(param), &mut bytes);
    Tensor::from_bytes(bytes, 1, dtype)
}

/// `op(src, param)` with `param` converted to the dtype of `src`.
pub fn elementwise_scalar(src: &Tensor, param: f64, op: ElewOp) -> IngotResult<Tensor> {
    let operand = scalar_operand(param, src.dtype())?;
    elementwise_broadcast(src, &operand, op)
}

pub fn elementwise_scalar_into(src: &Tensor, param: f64, dst: &mut Tensor, op: ElewOp) -> IngotResult<()> {
    let operand = scalar_operand(param, src.dtype())?;
    elementwise_broadcast_into(src, &operand, dst, op)
}

impl Tensor {
    pub fn maximum(&self, other: &Tensor) -> IngotResult<Tensor> {
        elementwise_broadcast(self, other, ElewOp::Max)
    }

    pub fn minimum(&self, other: &Tensor) -> IngotResult<Tensor> {
        elementwise_broadcast(self, other, ElewOp::Min)
    }

    pub fn pow(&self, other: &Tensor) -> IngotResult<Tensor> {
        elementwise_broadcast(self, other, ElewOp::Pow)
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<&Tensor> for &Tensor {
            type Output = IngotResult<Tensor>;

            fn $method(self, rhs: &Tensor) -> Self::Output {
                elementwise_broadcast(self, rhs, $op)
            }
        }
    };
}

impl_binary_operator!(Add, add, ElewOp::Sum);
impl_binary_operator!(Sub, sub, ElewOp::Sub);
impl_binary_operator!(Mul, mul, ElewOp::Mul);
impl_binary_operator!(Div, div, ElewOp::Div);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_add_row_and_column() {
        let a = Tensor::from_vec(vec![1.0f32, 2.0], (2, 1)).unwrap();
        let b = Tensor::from_vec(vec![10.0f32, 20.0, 30.0], (1, 3)).unwrap();
        let out = (&a + &b).unwrap();
        assert_eq!(out.dims(), &[2, 3]);
        assert_eq!(out.to_vec_as::<f32>(), vec![11.0, 21.0, 31.0, 12.0, 22.0, 32.0]);
    }

    #[test]
    fn test_broadcast_lower_rank_operand() {
        let flat = Tensor::arange(0.0, 6.0, 1.0, DType::I32).unwrap();
        let a = flat.view_as((2, 3)).unwrap();
        let b = Tensor::from_vec(vec![100i32, 200, 300], 3).unwrap();
        let out = elementwise_broadcast(&a, &b, ElewOp::Sum).unwrap();
        assert_eq!(out.to_vec_as::<i32>(), vec![100, 201, 302, 103, 204, 305]);

        let out = elementwise_broadcast(&b, &a, ElewOp::Sub).unwrap();
        assert_eq!(out.to_vec_as::<i32>(), vec![100, 199, 298, 97, 196, 295]);
    }

    #[test]
    fn test_every_operator_on_floats() {
        let a = Tensor::from_vec(vec![2.0f64, 9.0], 2).unwrap();
        let b = Tensor::from_vec(vec![3.0f64], 1).unwrap();
        let run = |op| elementwise_broadcast(&a, &b, op).unwrap().to_vec_as::<f64>();
        assert_eq!(run(ElewOp::Mul), vec![6.0, 27.0]);
        assert_eq!(run(ElewOp::Div), vec![2.0 / 3.0, 3.0]);
        assert_eq!(run(ElewOp::Sum), vec![5.0, 12.0]);
        assert_eq!(run(ElewOp::Sub), vec![-1.0, 6.0]);
        assert_eq!(run(ElewOp::Max), vec![3.0, 9.0]);
        assert_eq!(run(ElewOp::Min), vec![2.0, 3.0]);
        assert_eq!(run(ElewOp::Pow), vec![8.0, 729.0]);
    }

    #[test]
    fn test_incompatible_shapes_are_recoverable() {
        let a = Tensor::zeros((3, 4), DType::F32).unwrap();
        let b = Tensor::zeros((2, 4), DType::F32).unwrap();
        let err = elementwise_broadcast(&a, &b, ElewOp::Sum).unwrap_err();
        assert!(matches!(err, IngotError::NotBroadcastable { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_destination_reuse_overwrites_everything() {
        let mut dst = Tensor::zeros((2, 3), DType::I64).unwrap();

        let a = Tensor::from_vec(vec![1i64, 2], (2, 1)).unwrap();
        let b = Tensor::from_vec(vec![10i64, 20, 30], (1, 3)).unwrap();
        elementwise_broadcast_into(&a, &b, &mut dst, ElewOp::Mul).unwrap();
        assert_eq!(dst.to_vec_as::<i64>(), vec![10, 20, 30, 20, 40, 60]);

        let c = Tensor::from_vec(vec![-1i64, -2, -3, -4, -5, -6], (2, 3)).unwrap();
        let d = Tensor::from_vec(vec![0i64], 1).unwrap();
        elementwise_broadcast_into(&c, &d, &mut dst, ElewOp::Sum).unwrap();
        assert_eq!(dst.to_vec_as::<i64>(), vec![-1, -2, -3, -4, -5, -6]);
    }

    #[test]
    fn test_destination_mismatch_leaves_destination_untouched() {
        let a = Tensor::from_vec(vec![1u8, 2], (2, 1)).unwrap();
        let b = Tensor::from_vec(vec![1u8, 1, 1], (1, 3)).unwrap();

        let mut wrong_shape = Tensor::from_vec(vec![7u8; 6], (3, 2)).unwrap();
        let err = elementwise_broadcast_into(&a, &b, &mut wrong_shape, ElewOp::Sum).unwrap_err();
        assert!(matches!(err, IngotError::DestinationShape { .. }));
        assert_eq!(wrong_shape.to_vec_as::<u8>(), vec![7; 6]);

        let mut wrong_dtype = Tensor::zeros((2, 3), DType::U16).unwrap();
        let err = elementwise_broadcast_into(&a, &b, &mut wrong_dtype, ElewOp::Sum).unwrap_err();
        assert!(matches!(err, IngotError::DestinationDType { expected: DType::U8, got: DType::U16 }));
    }

    #[test]
    fn test_in_place_through_view() {
        let owner = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], (2, 2)).unwrap();
        let bias = Tensor::from_vec(vec![0.5f32, -0.5], 2).unwrap();
        let lhs = owner.view();
        let mut dst = owner.view();
        elementwise_broadcast_into(&lhs, &bias, &mut dst, ElewOp::Sum).unwrap();
        assert_eq!(owner.to_vec_as::<f32>(), vec![1.5, 1.5, 3.5, 3.5]);
    }

    #[test]
    fn test_same_operand_twice() {
        let a = Tensor::from_vec(vec![3u16, 4], 2).unwrap();
        let out = elementwise_broadcast(&a, &a.view(), ElewOp::Mul).unwrap();
        assert_eq!(out.to_vec_as::<u16>(), vec![9, 16]);
    }

    #[test]
    fn test_same_shape_elementwise() {
        let a = Tensor::from_vec(vec![1i8, 2, 3], 3).unwrap();
        let b = Tensor::from_vec(vec![4i8, 5, 6], 3).unwrap();
        assert_eq!(elementwise(&a, &b, ElewOp::Max).unwrap().to_vec_as::<i8>(), vec![4, 5, 6]);

        let c = Tensor::from_vec(vec![1i8], 1).unwrap();
        let err = elementwise(&a, &c, ElewOp::Sum).unwrap_err();
        assert!(matches!(err, IngotError::ShapeMismatch(_)));
        let message = err.to_string();
        assert!(message.contains("Operation: sum"));
        assert!(message.contains("Tensor shapes: [3], [1]"));
        assert!(message.contains("elementwise_broadcast"));

        let mut dst = Tensor::zeros(3, DType::I8).unwrap();
        elementwise_into(&a, &b, &mut dst, ElewOp::Sub).unwrap();
        assert_eq!(dst.to_vec_as::<i8>(), vec![-3, -3, -3]);
    }

    #[test]
    fn test_scalar_parameter_is_converted() {
        let a = Tensor::from_vec(vec![10u8, 20, 250], 3).unwrap();
        let out = elementwise_scalar(&a, 7.9, ElewOp::Sum).unwrap();
        assert_eq!(out.to_vec_as::<u8>(), vec![17, 27, 1]);

        let out = elementwise_scalar(&a, 1000.0, ElewOp::Min).unwrap();
        assert_eq!(out.to_vec_as::<u8>(), vec![10, 20, 250]);

        let mut dst = Tensor::zeros(3, DType::U8).unwrap();
        elementwise_scalar_into(&a, 10.0, &mut dst, ElewOp::Div).unwrap();
        assert_eq!(dst.to_vec_as::<u8>(), vec![1, 2, 25]);
    }

    #[test]
    fn test_bool_broadcast() {
        let a = Tensor::from_vec(vec![true, false], (2, 1)).unwrap();
        let b = Tensor::from_vec(vec![true, false], (1, 2)).unwrap();
        let and = elementwise_broadcast(&a, &b, ElewOp::Mul).unwrap();
        assert_eq!(and.to_vec_as::<bool>(), vec![true, false, false, false]);
        let or = a.maximum(&b).unwrap();
        assert_eq!(or.to_vec_as::<bool>(), vec![true, true, true, false]);
    }

    #[test]
    fn test_operator_methods() {
        let a = Tensor::from_vec(vec![8.0f32, 4.0], 2).unwrap();
        let b = Tensor::from_vec(vec![2.0f32], 1).unwrap();
        assert_eq!((&a - &b).unwrap().to_vec_as::<f32>(), vec![6.0, 2.0]);
        assert_eq!((&a * &b).unwrap().to_vec_as::<f32>(), vec![16.0, 8.0]);
        assert_eq!((&a / &b).unwrap().to_vec_as::<f32>(), vec![4.0, 2.0]);
        assert_eq!(a.minimum(&b).unwrap().to_vec_as::<f32>(), vec![2.0, 2.0]);
        assert_eq!(a.pow(&b).unwrap().to_vec_as::<f32>(), vec![64.0, 16.0]);
    }

    #[test]
    #[should_panic(expected = "contract violation: elementwise sum between f32 and f64")]
    fn test_mixed_dtypes_are_fatal() {
        let a = Tensor::zeros(2, DType::F32).unwrap();
        let b = Tensor::zeros(2, DType::F64).unwrap();
        let _ = elementwise_broadcast(&a, &b, ElewOp::Sum);
    }

    #[test]
    #[should_panic(expected = "not supported for dtype bool")]
    fn test_unsupported_operator_is_fatal() {
        let a = Tensor::zeros(2, DType::Bool).unwrap();
        let _ = elementwise_broadcast(&a, &a.view(), ElewOp::Sub);
    }

    #[test]
    #[should_panic(expected = "released the storage")]
    fn test_view_of_released_owner_is_fatal() {
        let owner = Tensor::zeros(2, DType::F32).unwrap();
        let view = owner.view();
        owner.release_with_storage();
        let _ = elementwise_broadcast(&view, &view, ElewOp::Sum);
    }
}
