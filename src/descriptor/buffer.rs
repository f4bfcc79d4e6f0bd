//! Typed-buffer shortcuts: the ten numeric element kinds share `list<T>`'s
//! wire layout but bulk-copy bytes instead of recursing element-by-element.

use crate::error::{MarshalError, Result};
use crate::flat::{FlatStream, FlatValue};
use crate::memory::{GuestAllocator, Memory};
use crate::value::{TypedBuffer, Value};

/// Which of the ten numeric element kinds a [`super::Type::Buffer`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum BufferElem {
    /// `buffer<s8>`.
    I8,
    /// `buffer<s16>`.
    I16,
    /// `buffer<s32>`.
    I32,
    /// `buffer<s64>`.
    I64,
    /// `buffer<u8>`.
    U8,
    /// `buffer<u16>`.
    U16,
    /// `buffer<u32>`.
    U32,
    /// `buffer<u64>`.
    U64,
    /// `buffer<float32>`.
    F32,
    /// `buffer<float64>`.
    F64,
}

impl BufferElem {
    fn width(self) -> u32 {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// The element's natural alignment, identical to its width for every
    /// numeric kind — the same alignment a `list<T>` of the matching
    /// primitive type would use for its data body.
    fn alignment(self) -> u32 {
        self.width()
    }
}

fn load_bytes<A: GuestAllocator>(elem: BufferElem, mem: &Memory<A>, data_ptr: u32, len: u32) -> Result<TypedBuffer> {
    let width = elem.width();
    let total = width
        .checked_mul(len)
        .ok_or_else(|| MarshalError::abi_violation("buffer byte length overflow"))?;
    let bytes = mem.read_bytes(data_ptr, total as usize)?;
    Ok(match elem {
        BufferElem::I8 => TypedBuffer::I8(bytes.iter().map(|&b| b as i8).collect()),
        BufferElem::U8 => TypedBuffer::U8(bytes.to_vec()),
        BufferElem::I16 => TypedBuffer::I16(
            bytes.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect(),
        ),
        BufferElem::U16 => TypedBuffer::U16(
            bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect(),
        ),
        BufferElem::I32 => TypedBuffer::I32(
            bytes
                .chunks_exact(4)
                .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        BufferElem::U32 => TypedBuffer::U32(
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        BufferElem::F32 => TypedBuffer::F32(
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
        BufferElem::I64 => TypedBuffer::I64(
            bytes
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        BufferElem::U64 => TypedBuffer::U64(
            bytes
                .chunks_exact(8)
                .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
        BufferElem::F64 => TypedBuffer::F64(
            bytes
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        ),
    })
}

fn to_bytes(buf: &TypedBuffer) -> Vec<u8> {
    match buf {
        TypedBuffer::I8(v) => v.iter().map(|&x| x as u8).collect(),
        TypedBuffer::U8(v) => v.clone(),
        TypedBuffer::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TypedBuffer::U16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TypedBuffer::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TypedBuffer::U32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TypedBuffer::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TypedBuffer::U64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TypedBuffer::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        TypedBuffer::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
    }
}

fn len_of(buf: &TypedBuffer) -> usize {
    match buf {
        TypedBuffer::I8(v) => v.len(),
        TypedBuffer::U8(v) => v.len(),
        TypedBuffer::I16(v) => v.len(),
        TypedBuffer::U16(v) => v.len(),
        TypedBuffer::I32(v) => v.len(),
        TypedBuffer::U32(v) => v.len(),
        TypedBuffer::I64(v) => v.len(),
        TypedBuffer::U64(v) => v.len(),
        TypedBuffer::F32(v) => v.len(),
        TypedBuffer::F64(v) => v.len(),
    }
}

pub(super) fn load<A: GuestAllocator>(elem: BufferElem, mem: &Memory<A>, ptr: u32) -> Result<Value> {
    let data_ptr = mem.get_u32(ptr)?;
    let len = mem.get_u32(ptr + 4)?;
    Ok(Value::Buffer(load_bytes(elem, mem, data_ptr, len)?))
}

pub(super) fn store<A: GuestAllocator>(elem: BufferElem, mem: &mut Memory<A>, ptr: u32, value: &Value) -> Result<()> {
    let Value::Buffer(buf) = value else {
        return Err(MarshalError::abi_violation("expected a buffer value"));
    };
    let bytes = to_bytes(buf);
    let data_ptr = mem.alloc(elem.alignment(), bytes.len() as u32);
    mem.write_bytes(data_ptr, &bytes)?;
    mem.set_u32(ptr, data_ptr)?;
    mem.set_u32(ptr + 4, len_of(buf) as u32)
}

pub(super) fn lift<A: GuestAllocator>(elem: BufferElem, mem: &Memory<A>, stream: &mut FlatStream) -> Result<Value> {
    let data_ptr = stream.next()?.as_i32()? as u32;
    let len = stream.next()?.as_i32()? as u32;
    Ok(Value::Buffer(load_bytes(elem, mem, data_ptr, len)?))
}

pub(super) fn lower<A: GuestAllocator>(
    elem: BufferElem,
    sink: &mut crate::flat::FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
) -> Result<()> {
    let Value::Buffer(buf) = value else {
        return Err(MarshalError::abi_violation("expected a buffer value"));
    };
    let bytes = to_bytes(buf);
    let data_ptr = mem.alloc(elem.alignment(), bytes.len() as u32);
    mem.write_bytes(data_ptr, &bytes)?;
    sink.push(FlatValue::I32(data_ptr as i32));
    sink.push(FlatValue::I32(len_of(buf) as i32));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Type;
    use crate::memory::BumpAllocator;

    fn mem() -> Memory<BumpAllocator> {
        Memory::new(vec![0; 256], BumpAllocator::default())
    }

    #[test]
    fn u8_buffer_round_trip() {
        let ty = Type::Buffer(BufferElem::U8);
        let mut m = mem();
        let opts = Default::default();
        let value = Value::Buffer(TypedBuffer::U8(vec![1, 2, 3, 255]));
        ty.store(&mut m, 0, &value, &opts).unwrap();
        assert_eq!(ty.load(&m, 0, &opts).unwrap(), value);
    }

    #[test]
    fn f64_buffer_lower_lift() {
        let ty = Type::Buffer(BufferElem::F64);
        let opts = Default::default();
        let mut m = mem();
        let mut sink = crate::flat::FlatSink::new();
        let value = Value::Buffer(TypedBuffer::F64(vec![1.5, -2.25]));
        ty.lower(&mut sink, &mut m, &value, &opts).unwrap();
        let mut stream = sink.into_stream();
        assert_eq!(ty.lift(&m, &mut stream, &opts).unwrap(), value);
    }
}
