//! The flat ABI: primitive machine-value slots, sinks, streams, and the
//! variant coercion iterator.

use crate::error::{MarshalError, Result};
use std::collections::VecDeque;

/// One of the four primitive machine types a value can occupy on the flat
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlatType {
    /// 32-bit integer slot.
    I32,
    /// 64-bit integer slot.
    I64,
    /// 32-bit float slot.
    F32,
    /// 64-bit float slot.
    F64,
}

/// A single flat machine value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FlatValue {
    /// A 32-bit integer slot value.
    I32(i32),
    /// A 64-bit integer slot value.
    I64(i64),
    /// A 32-bit float slot value.
    F32(f32),
    /// A 64-bit float slot value.
    F64(f64),
}

impl FlatValue {
    /// The [`FlatType`] this value occupies.
    pub const fn flat_type(&self) -> FlatType {
        match self {
            Self::I32(_) => FlatType::I32,
            Self::I64(_) => FlatType::I64,
            Self::F32(_) => FlatType::F32,
            Self::F64(_) => FlatType::F64,
        }
    }

    /// Unwrap an `i32` slot, or fail with [`MarshalError::ABIViolation`].
    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Self::I32(v) => Ok(*v),
            other => Err(MarshalError::abi_violation(format!(
                "expected i32 slot, found {:?}",
                other.flat_type()
            ))),
        }
    }

    /// Unwrap an `i64` slot, or fail with [`MarshalError::ABIViolation`].
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Self::I64(v) => Ok(*v),
            other => Err(MarshalError::abi_violation(format!(
                "expected i64 slot, found {:?}",
                other.flat_type()
            ))),
        }
    }

    /// Unwrap an `f32` slot, or fail with [`MarshalError::ABIViolation`].
    pub fn as_f32(&self) -> Result<f32> {
        match self {
            Self::F32(v) => Ok(*v),
            other => Err(MarshalError::abi_violation(format!(
                "expected f32 slot, found {:?}",
                other.flat_type()
            ))),
        }
    }

    /// Unwrap an `f64` slot, or fail with [`MarshalError::ABIViolation`].
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::F64(v) => Ok(*v),
            other => Err(MarshalError::abi_violation(format!(
                "expected f64 slot, found {:?}",
                other.flat_type()
            ))),
        }
    }

    /// The zero value for `ty`, used to pad unused variant slots.
    pub const fn zero(ty: FlatType) -> Self {
        match ty {
            FlatType::I32 => Self::I32(0),
            FlatType::I64 => Self::I64(0),
            FlatType::F32 => Self::F32(0.0),
            FlatType::F64 => Self::F64(0.0),
        }
    }
}

/// An append-only destination for lowered flat values.
///
/// Mirrors the teacher's treatment of append-only logs (`interpreter::log`):
/// a `Vec` wrapped behind a narrow push-only interface.
#[derive(Debug, Clone, Default)]
pub struct FlatSink {
    slots: Vec<FlatValue>,
}

impl FlatSink {
    /// A fresh, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one flat value.
    pub fn push(&mut self, value: FlatValue) {
        self.slots.push(value);
    }

    /// Number of slots written so far.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Consume the sink into a single-pass [`FlatStream`] for lifting.
    pub fn into_stream(self) -> FlatStream {
        FlatStream {
            slots: self.slots.into(),
        }
    }

    /// Borrow the written slots.
    pub fn as_slice(&self) -> &[FlatValue] {
        &self.slots
    }
}

/// A single-pass source of flat values consumed during lift.
///
/// Each descriptor must consume exactly the count declared in its
/// `flat_types`; nothing here allows rewinding.
#[derive(Debug, Clone)]
pub struct FlatStream {
    slots: VecDeque<FlatValue>,
}

impl FlatStream {
    /// Wrap an existing sequence of flat values.
    pub fn new(slots: impl IntoIterator<Item = FlatValue>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    /// Consume and return the next slot.
    pub fn next(&mut self) -> Result<FlatValue> {
        self.slots
            .pop_front()
            .ok_or_else(|| MarshalError::abi_violation("flat stream exhausted"))
    }

    /// Peek the next slot's type without consuming it.
    pub fn peek_type(&self) -> Option<FlatType> {
        self.slots.front().map(FlatValue::flat_type)
    }

    /// Remaining, unconsumed slot count.
    pub fn remaining(&self) -> usize {
        self.slots.len()
    }

    /// Whether every slot has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Pure bit-cast / value-preserving widening routines used to join a
/// variant case's natural flat shape to the variant's joined shape (lower)
/// and back (lift). Never value-preserving conversions where the rule calls
/// for a reinterpret.
pub mod reinterpret {
    /// Reinterpret an `f32`'s bits as an `i32` (lower: f32 case into i32 slot).
    pub fn f32_as_i32(v: f32) -> i32 {
        v.to_bits() as i32
    }

    /// Reinterpret an `i32`'s bits as an `f32` (lift: i32 slot into f32 case).
    pub fn i32_as_f32(v: i32) -> f32 {
        f32::from_bits(v as u32)
    }

    /// Widen an `i32` to `i64` (lower: i32 case into i64 slot).
    pub fn i32_to_i64(v: i32) -> i64 {
        v as i64
    }

    /// Narrow an `i64` back to `i32` (lift: i64 slot into i32 case).
    ///
    /// Only the low 32 bits are meaningful; this is the inverse of
    /// [`i32_to_i64`] for values that round-tripped through the join.
    pub fn i64_as_i32(v: i64) -> i32 {
        v as i32
    }

    /// Reinterpret an `f32`'s bits as the low half of an `i64` (lower: f32
    /// case joined against an i64 slot alongside other i64-needing cases).
    pub fn f32_as_i64(v: f32) -> i64 {
        v.to_bits() as i64
    }

    /// Inverse of [`f32_as_i64`].
    pub fn i64_as_f32(v: i64) -> f32 {
        f32::from_bits(v as u32)
    }

    /// Reinterpret an `f64`'s bits as `i64` (lower: f64 case into i64 slot).
    pub fn f64_as_i64(v: f64) -> i64 {
        v.to_bits() as i64
    }

    /// Inverse of [`f64_as_i64`].
    pub fn i64_as_f64(v: i64) -> f64 {
        f64::from_bits(v as u64)
    }
}

/// Widen a single lowered slot of type `have` to the joined type `want`,
/// applying the reinterpret rules from §4.6. `have` must be one of the case's
/// own `want_flat_types`; `want` is the variant's joined type at that
/// position, which is always at least as wide (enforced at
/// `VariantType` construction).
pub fn widen(value: FlatValue, want: FlatType) -> FlatValue {
    use FlatType::*;
    match (value, want) {
        (v, w) if v.flat_type() == w => v,
        (FlatValue::F32(v), I32) => FlatValue::I32(reinterpret::f32_as_i32(v)),
        (FlatValue::I32(v), I64) => FlatValue::I64(reinterpret::i32_to_i64(v)),
        (FlatValue::F32(v), I64) => FlatValue::I64(reinterpret::f32_as_i64(v)),
        (FlatValue::F64(v), I64) => FlatValue::I64(reinterpret::f64_as_i64(v)),
        (v, w) => unreachable!("no widening rule from {:?} to {:?}", v.flat_type(), w),
    }
}

/// Narrow a single streamed slot of the joined type `have` back to the
/// case's natural type `want`, applying the inverse reinterpret rules.
pub fn narrow(value: FlatValue, want: FlatType) -> Result<FlatValue> {
    use FlatType::*;
    match (value, want) {
        (v, w) if v.flat_type() == w => Ok(v),
        (FlatValue::I32(v), F32) => Ok(FlatValue::F32(reinterpret::i32_as_f32(v))),
        (FlatValue::I64(v), I32) => Ok(FlatValue::I32(reinterpret::i64_as_i32(v))),
        (FlatValue::I64(v), F32) => Ok(FlatValue::F32(reinterpret::i64_as_f32(v))),
        (FlatValue::I64(v), F64) => Ok(FlatValue::F64(reinterpret::i64_as_f64(v))),
        (v, w) => Err(MarshalError::abi_violation(format!(
            "no coercion from {:?} to {:?}",
            v.flat_type(),
            w
        ))),
    }
}

/// A one-slot-ahead adapter wrapping a [`FlatStream`] so a variant case's
/// lifter sees its own natural `want_flat_types` shape regardless of the
/// variant's wider joined shape.
pub struct CoercionIter<'a> {
    stream: &'a mut FlatStream,
    want: std::vec::IntoIter<FlatType>,
}

impl<'a> CoercionIter<'a> {
    /// Build an adapter that will narrow exactly `want.len()` slots from
    /// `stream`.
    pub fn new(stream: &'a mut FlatStream, want: Vec<FlatType>) -> Self {
        Self {
            stream,
            want: want.into_iter(),
        }
    }

    /// Consume and narrow the next slot to its case-natural type.
    pub fn next(&mut self) -> Result<FlatValue> {
        let want = self
            .want
            .next()
            .ok_or_else(|| MarshalError::abi_violation("coercion iterator exhausted"))?;
        let have = self.stream.next()?;
        narrow(have, want)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_stream_round_trip() {
        let mut sink = FlatSink::new();
        sink.push(FlatValue::I32(7));
        sink.push(FlatValue::F64(1.25));
        let mut stream = sink.into_stream();
        assert_eq!(stream.next().unwrap().as_i32().unwrap(), 7);
        assert_eq!(stream.next().unwrap().as_f64().unwrap(), 1.25);
        assert!(stream.is_exhausted());
    }

    #[test]
    fn widen_then_narrow_f32_i32() {
        let widened = widen(FlatValue::F32(3.5), FlatType::I32);
        assert_eq!(widened, FlatValue::I32(3.5f32.to_bits() as i32));
        let narrowed = narrow(widened, FlatType::F32).unwrap();
        assert_eq!(narrowed, FlatValue::F32(3.5));
    }

    #[test]
    fn widen_then_narrow_i32_i64() {
        let widened = widen(FlatValue::I32(-1), FlatType::I64);
        assert_eq!(widened, FlatValue::I64(-1));
        let narrowed = narrow(widened, FlatType::I32).unwrap();
        assert_eq!(narrowed, FlatValue::I32(-1));
    }

    #[test]
    fn narrow_rejects_unsupported_pair() {
        assert!(narrow(FlatValue::F32(1.0), FlatType::I64).is_err());
    }
}
