//! `list<T>`: a `(data_ptr, length)` pair with per-element recursion into
//! the element descriptor.

use super::Type;
use crate::error::{MarshalError, Result};
use crate::flat::{FlatStream, FlatValue};
use crate::memory::{GuestAllocator, Memory};
use crate::options::CanonicalOptions;
use crate::value::Value;

pub(super) fn load_list<A: GuestAllocator>(
    elem: &Type,
    mem: &Memory<A>,
    ptr: u32,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let data_ptr = mem.get_u32(ptr)?;
    let len = mem.get_u32(ptr + 4)?;
    load_elements(elem, mem, data_ptr, len, opts)
}

fn load_elements<A: GuestAllocator>(
    elem: &Type,
    mem: &Memory<A>,
    data_ptr: u32,
    len: u32,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let stride = elem.size();
    let mut items = Vec::with_capacity(len as usize);
    for i in 0..len {
        let offset = data_ptr
            .checked_add(i.checked_mul(stride).ok_or_else(|| MarshalError::abi_violation("list offset overflow"))?)
            .ok_or_else(|| MarshalError::abi_violation("list offset overflow"))?;
        items.push(elem.load(mem, offset, opts)?);
    }
    Ok(Value::List(items))
}

pub(super) fn store_list<A: GuestAllocator>(
    elem: &Type,
    mem: &mut Memory<A>,
    ptr: u32,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::List(items) = value else {
        return Err(MarshalError::abi_violation("expected a list value"));
    };
    let stride = elem.size();
    let total = stride
        .checked_mul(items.len() as u32)
        .ok_or_else(|| MarshalError::abi_violation("list byte length overflow"))?;
    let data_ptr = mem.alloc(elem.alignment(), total);
    for (i, item) in items.iter().enumerate() {
        let offset = data_ptr + i as u32 * stride;
        elem.store(mem, offset, item, opts)?;
    }
    mem.set_u32(ptr, data_ptr)?;
    mem.set_u32(ptr + 4, items.len() as u32)
}

pub(super) fn lift_list<A: GuestAllocator>(
    elem: &Type,
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let data_ptr = stream.next()?.as_i32()? as u32;
    let len = stream.next()?.as_i32()? as u32;
    load_elements(elem, mem, data_ptr, len, opts)
}

pub(super) fn lower_list<A: GuestAllocator>(
    elem: &Type,
    sink: &mut crate::flat::FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::List(items) = value else {
        return Err(MarshalError::abi_violation("expected a list value"));
    };
    let stride = elem.size();
    let total = stride
        .checked_mul(items.len() as u32)
        .ok_or_else(|| MarshalError::abi_violation("list byte length overflow"))?;
    let data_ptr = mem.alloc(elem.alignment(), total);
    for (i, item) in items.iter().enumerate() {
        let offset = data_ptr + i as u32 * stride;
        elem.store(mem, offset, item, opts)?;
    }
    sink.push(FlatValue::I32(data_ptr as i32));
    sink.push(FlatValue::I32(items.len() as i32));
    Ok(())
}
