//! Primitive numeric descriptors: range-checked scalars sharing a single
//! flat slot (`i32` for anything ≤32 bits plus `bool`/`char`, `i64` for
//! 64-bit integers, `f32`/`f64` for floats).

use super::Type;
use crate::consts::{CANONICAL_F32_NAN_BITS, CANONICAL_F64_NAN_BITS, CHAR_MAX_EXCLUSIVE, SURROGATE_RANGE_END, SURROGATE_RANGE_START};
use crate::error::{MarshalError, Result};
use crate::flat::{FlatStream, FlatValue};
use crate::memory::{GuestAllocator, Memory};
use crate::value::Value;

fn validate_char(raw: u32) -> Result<char> {
    if (SURROGATE_RANGE_START..=SURROGATE_RANGE_END).contains(&raw) || raw >= CHAR_MAX_EXCLUSIVE {
        return Err(MarshalError::invalid_char(raw));
    }
    char::from_u32(raw).ok_or_else(|| MarshalError::invalid_char(raw))
}

/// Validate that a raw flat `i32` slot fits in `bits` unsigned bits, i.e. is
/// in `[0, 2^bits - 1]`. Negative slots are always rejected: bool, the
/// unsigned integers, and the unsigned-bit-pattern encoding of the signed
/// integers never carry a negative wire representation.
fn unsigned_range(raw: i32, bits: u32, kind: &'static str) -> Result<u32> {
    if raw < 0 {
        return Err(MarshalError::invalid_signed(kind, raw as i128));
    }
    let max = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
    let raw = raw as u32;
    if raw > max {
        return Err(MarshalError::invalid_unsigned(kind, raw as u128));
    }
    Ok(raw)
}

/// Reinterpret an unsigned wire value of `bits` width as its signed
/// two's-complement counterpart.
fn to_signed(raw: u32, bits: u32) -> i32 {
    let half = 1u32 << (bits - 1);
    if raw >= half {
        (raw as i64 - (1i64 << bits)) as i32
    } else {
        raw as i32
    }
}

pub(super) fn load<A: GuestAllocator>(ty: &Type, mem: &Memory<A>, ptr: u32) -> Result<Value> {
    Ok(match ty {
        Type::Bool => Value::Bool(mem.get_u8(ptr)? != 0),
        Type::U8 => Value::U8(mem.get_u8(ptr)?),
        Type::U16 => Value::U16(mem.get_u16(ptr)?),
        Type::U32 => Value::U32(mem.get_u32(ptr)?),
        Type::U64 => Value::U64(mem.get_u64(ptr)?),
        Type::S8 => Value::S8(mem.get_u8(ptr)? as i8),
        Type::S16 => Value::S16(mem.get_u16(ptr)? as i16),
        Type::S32 => Value::S32(mem.get_u32(ptr)? as i32),
        Type::S64 => Value::S64(mem.get_u64(ptr)? as i64),
        Type::Float32 => Value::Float32(canonicalize_f32(mem.get_f32(ptr)?)),
        Type::Float64 => Value::Float64(canonicalize_f64(mem.get_f64(ptr)?)),
        Type::Char => Value::Char(validate_char(mem.get_u32(ptr)?)?),
        _ => unreachable!("not a primitive type"),
    })
}

pub(super) fn store<A: GuestAllocator>(ty: &Type, mem: &mut Memory<A>, ptr: u32, value: &Value) -> Result<()> {
    match (ty, value) {
        (Type::Bool, Value::Bool(v)) => mem.set_u8(ptr, *v as u8),
        (Type::U8, Value::U8(v)) => mem.set_u8(ptr, *v),
        (Type::U16, Value::U16(v)) => mem.set_u16(ptr, *v),
        (Type::U32, Value::U32(v)) => mem.set_u32(ptr, *v),
        (Type::U64, Value::U64(v)) => mem.set_u64(ptr, *v),
        (Type::S8, Value::S8(v)) => mem.set_u8(ptr, *v as u8),
        (Type::S16, Value::S16(v)) => mem.set_u16(ptr, *v as u16),
        (Type::S32, Value::S32(v)) => mem.set_u32(ptr, *v as u32),
        (Type::S64, Value::S64(v)) => mem.set_u64(ptr, *v as u64),
        (Type::Float32, Value::Float32(v)) => mem.set_f32(ptr, canonicalize_f32(*v)),
        (Type::Float64, Value::Float64(v)) => mem.set_f64(ptr, canonicalize_f64(*v)),
        (Type::Char, Value::Char(v)) => mem.set_u32(ptr, *v as u32),
        _ => Err(MarshalError::abi_violation(format!(
            "value shape does not match descriptor kind `{}`",
            ty.kind()
        ))),
    }
}

pub(super) fn lift(ty: &Type, stream: &mut FlatStream) -> Result<Value> {
    Ok(match ty {
        Type::Bool => {
            let raw = stream.next()?.as_i32()?;
            if raw < 0 {
                return Err(MarshalError::invalid_signed("bool", raw as i128));
            }
            Value::Bool(raw != 0)
        }
        Type::U8 => Value::U8(unsigned_range(stream.next()?.as_i32()?, 8, "u8")? as u8),
        Type::U16 => Value::U16(unsigned_range(stream.next()?.as_i32()?, 16, "u16")? as u16),
        Type::U32 => Value::U32(unsigned_range(stream.next()?.as_i32()?, 32, "u32")?),
        Type::U64 => Value::U64(stream.next()?.as_i64()? as u64),
        Type::S8 => Value::S8(to_signed(unsigned_range(stream.next()?.as_i32()?, 8, "s8")?, 8) as i8),
        Type::S16 => Value::S16(to_signed(unsigned_range(stream.next()?.as_i32()?, 16, "s16")?, 16) as i16),
        Type::S32 => Value::S32(to_signed(unsigned_range(stream.next()?.as_i32()?, 32, "s32")?, 32)),
        Type::S64 => Value::S64(stream.next()?.as_i64()?),
        Type::Float32 => Value::Float32(canonicalize_f32(stream.next()?.as_f32()?)),
        Type::Float64 => Value::Float64(canonicalize_f64(stream.next()?.as_f64()?)),
        Type::Char => Value::Char(validate_char(unsigned_range(stream.next()?.as_i32()?, 32, "char")?)?),
        _ => unreachable!("not a primitive type"),
    })
}

pub(super) fn lower(ty: &Type, sink: &mut crate::flat::FlatSink, value: &Value) -> Result<()> {
    let slot = match (ty, value) {
        (Type::Bool, Value::Bool(v)) => FlatValue::I32(*v as i32),
        (Type::U8, Value::U8(v)) => FlatValue::I32(*v as i32),
        (Type::U16, Value::U16(v)) => FlatValue::I32(*v as i32),
        (Type::U32, Value::U32(v)) => FlatValue::I32(*v as i32),
        (Type::U64, Value::U64(v)) => FlatValue::I64(*v as i64),
        (Type::S8, Value::S8(v)) => FlatValue::I32(*v as u8 as i32),
        (Type::S16, Value::S16(v)) => FlatValue::I32(*v as u16 as i32),
        (Type::S32, Value::S32(v)) => FlatValue::I32(*v as u32 as i32),
        (Type::S64, Value::S64(v)) => FlatValue::I64(*v),
        (Type::Float32, Value::Float32(v)) => FlatValue::F32(canonicalize_f32(*v)),
        (Type::Float64, Value::Float64(v)) => FlatValue::F64(canonicalize_f64(*v)),
        (Type::Char, Value::Char(v)) => FlatValue::I32(*v as u32 as i32),
        _ => {
            return Err(MarshalError::abi_violation(format!(
                "value shape does not match descriptor kind `{}`",
                ty.kind()
            )))
        }
    };
    sink.push(slot);
    Ok(())
}

fn canonicalize_f32(v: f32) -> f32 {
    if v.is_nan() {
        f32::from_bits(CANONICAL_F32_NAN_BITS)
    } else {
        v
    }
}

fn canonicalize_f64(v: f64) -> f64 {
    if v.is_nan() {
        f64::from_bits(CANONICAL_F64_NAN_BITS)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BumpAllocator;

    fn mem() -> Memory<BumpAllocator> {
        Memory::new(vec![0; 64], BumpAllocator::default())
    }

    #[test]
    fn u8_round_trip_store_load() {
        let ty = Type::U8;
        let mut m = mem();
        ty.store(&mut m, 0, &Value::U8(255), &Default::default()).unwrap();
        assert_eq!(ty.load(&m, 0, &Default::default()).unwrap(), Value::U8(255));
    }

    #[test]
    fn u8_lift_rejects_out_of_range() {
        let ty = Type::U8;
        let mut stream = FlatStream::new([FlatValue::I32(256)]);
        assert!(ty.lift(&mem(), &mut stream, &Default::default()).is_err());

        let mut stream = FlatStream::new([FlatValue::I32(255)]);
        assert_eq!(
            ty.lift(&mem(), &mut stream, &Default::default()).unwrap(),
            Value::U8(255)
        );
    }

    #[test]
    fn s8_boundaries() {
        let ty = Type::S8;
        // wire 255 lifts as s8 = -1
        let mut stream = FlatStream::new([FlatValue::I32(255)]);
        assert_eq!(
            ty.lift(&mem(), &mut stream, &Default::default()).unwrap(),
            Value::S8(-1)
        );

        // s8(-128) round-trips through lower/lift
        let mut sink = crate::flat::FlatSink::new();
        let mut m = mem();
        ty.lower(&mut sink, &mut m, &Value::S8(-128), &Default::default()).unwrap();
        let mut stream = sink.into_stream();
        assert_eq!(
            ty.lift(&mem(), &mut stream, &Default::default()).unwrap(),
            Value::S8(-128)
        );
    }

    #[test]
    fn u32_boundaries() {
        let ty = Type::U32;
        let mut stream = FlatStream::new([FlatValue::I32(-1)]); // 0xFFFFFFFF as u32 = 2^32-1
        assert_eq!(
            ty.lift(&mem(), &mut stream, &Default::default()).unwrap(),
            Value::U32(u32::MAX)
        );
    }

    #[test]
    fn char_boundaries() {
        let ty = Type::Char;
        let mut stream = FlatStream::new([FlatValue::I32(0xD800)]);
        assert!(ty.lift(&mem(), &mut stream, &Default::default()).is_err());

        let mut stream = FlatStream::new([FlatValue::I32(0x10FFFF)]);
        assert_eq!(
            ty.lift(&mem(), &mut stream, &Default::default()).unwrap(),
            Value::Char('\u{10FFFF}')
        );
    }

    #[test]
    fn float_nan_canonicalizes() {
        let ty = Type::Float32;
        let mut sink = crate::flat::FlatSink::new();
        let mut m = mem();
        ty.lower(&mut sink, &mut m, &Value::Float32(f32::NAN), &Default::default())
            .unwrap();
        match sink.as_slice()[0] {
            FlatValue::F32(v) => assert_eq!(v.to_bits(), CANONICAL_F32_NAN_BITS),
            _ => panic!("wrong slot type"),
        }
    }
}
