//! Records and tuples: heterogeneous aggregates with declaration-order field
//! offsets, the way the teacher's `Call`/`CallFrame` pack fixed fields at
//! `const fn`-computed offsets.

use super::{align_up, Type};
use crate::error::{MarshalError, Result};
use crate::flat::{FlatStream, FlatType};
use crate::memory::{GuestAllocator, Memory};
use crate::options::CanonicalOptions;
use crate::value::Value;
use std::collections::HashMap;

/// One named, positioned field of a [`RecordType`].
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    ty: Type,
    offset: u32,
}

impl Field {
    /// Declare a field; its offset is assigned once the owning
    /// [`RecordType`] is built.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty, offset: 0 }
    }

    /// The field's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's descriptor.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// The field's byte offset within the owning record, assigned at
    /// construction.
    pub fn offset(&self) -> u32 {
        self.offset
    }
}

fn layout(fields: &mut [Field]) -> (u32, u32) {
    let mut offset = 0u32;
    let mut alignment = 1u32;
    for field in fields.iter_mut() {
        let field_align = field.ty.alignment();
        alignment = alignment.max(field_align);
        offset = align_up(offset, field_align);
        field.offset = offset;
        offset += field.ty.size();
    }
    (align_up(offset, alignment), alignment)
}

/// A record: named fields laid out in declaration order.
#[derive(Debug, Clone)]
pub struct RecordType {
    fields: Vec<Field>,
    size: u32,
    alignment: u32,
}

impl RecordType {
    /// Build a record descriptor, computing field offsets, total size and
    /// alignment from the declared field order.
    pub fn new(mut fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(MarshalError::abi_violation("record must declare at least one field"));
        }
        let (size, alignment) = layout(&mut fields);
        Ok(Self { fields, size, alignment })
    }

    /// Declared fields, in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Total footprint, including trailing alignment padding.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Maximum field alignment.
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Concatenated child `flat_types`, in declaration order.
    pub fn flat_types(&self) -> Vec<FlatType> {
        self.fields.iter().flat_map(|f| f.ty.flat_types()).collect()
    }
}

/// A tuple: the same layout as [`RecordType`] without field names.
#[derive(Debug, Clone)]
pub struct TupleType {
    elems: Vec<(Type, u32)>,
    size: u32,
    alignment: u32,
}

impl TupleType {
    /// Build a tuple descriptor from its element types, in positional order.
    pub fn new(elems: Vec<Type>) -> Result<Self> {
        if elems.is_empty() {
            return Err(MarshalError::abi_violation("tuple must declare at least one element"));
        }
        let mut fields: Vec<Field> = elems.into_iter().map(|t| Field::new("", t)).collect();
        let (size, alignment) = layout(&mut fields);
        let elems = fields.into_iter().map(|f| (f.ty, f.offset)).collect();
        Ok(Self { elems, size, alignment })
    }

    /// Element types and offsets, in positional order.
    pub fn elems(&self) -> &[(Type, u32)] {
        &self.elems
    }

    /// Total footprint, including trailing alignment padding.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Maximum element alignment.
    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    /// Concatenated child `flat_types`, in positional order.
    pub fn flat_types(&self) -> Vec<FlatType> {
        self.elems.iter().flat_map(|(t, _)| t.flat_types()).collect()
    }
}

pub(super) fn load_record<A: GuestAllocator>(
    r: &RecordType,
    mem: &Memory<A>,
    ptr: u32,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let mut out = HashMap::with_capacity(r.fields.len());
    for field in &r.fields {
        out.insert(field.name.clone(), field.ty.load(mem, ptr + field.offset, opts)?);
    }
    Ok(Value::Record(out))
}

pub(super) fn store_record<A: GuestAllocator>(
    r: &RecordType,
    mem: &mut Memory<A>,
    ptr: u32,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::Record(map) = value else {
        return Err(MarshalError::abi_violation("expected a record value"));
    };
    for field in &r.fields {
        let v = map
            .get(&field.name)
            .ok_or_else(|| MarshalError::abi_violation(format!("record missing field `{}`", field.name)))?;
        field.ty.store(mem, ptr + field.offset, v, opts)?;
    }
    Ok(())
}

pub(super) fn lift_record<A: GuestAllocator>(
    r: &RecordType,
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let mut out = HashMap::with_capacity(r.fields.len());
    for field in &r.fields {
        out.insert(field.name.clone(), field.ty.lift(mem, stream, opts)?);
    }
    Ok(Value::Record(out))
}

pub(super) fn lower_record<A: GuestAllocator>(
    r: &RecordType,
    sink: &mut crate::flat::FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::Record(map) = value else {
        return Err(MarshalError::abi_violation("expected a record value"));
    };
    for field in &r.fields {
        let v = map
            .get(&field.name)
            .ok_or_else(|| MarshalError::abi_violation(format!("record missing field `{}`", field.name)))?;
        field.ty.lower(sink, mem, v, opts)?;
    }
    Ok(())
}

pub(super) fn load_tuple<A: GuestAllocator>(
    t: &TupleType,
    mem: &Memory<A>,
    ptr: u32,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let mut out = Vec::with_capacity(t.elems.len());
    for (ty, offset) in &t.elems {
        out.push(ty.load(mem, ptr + offset, opts)?);
    }
    Ok(Value::Tuple(out))
}

pub(super) fn store_tuple<A: GuestAllocator>(
    t: &TupleType,
    mem: &mut Memory<A>,
    ptr: u32,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::Tuple(items) = value else {
        return Err(MarshalError::abi_violation("expected a tuple value"));
    };
    if items.len() != t.elems.len() {
        return Err(MarshalError::abi_violation("tuple arity mismatch"));
    }
    for (item, (ty, offset)) in items.iter().zip(&t.elems) {
        ty.store(mem, ptr + offset, item, opts)?;
    }
    Ok(())
}

pub(super) fn lift_tuple<A: GuestAllocator>(
    t: &TupleType,
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let mut out = Vec::with_capacity(t.elems.len());
    for (ty, _) in &t.elems {
        out.push(ty.lift(mem, stream, opts)?);
    }
    Ok(Value::Tuple(out))
}

pub(super) fn lower_tuple<A: GuestAllocator>(
    t: &TupleType,
    sink: &mut crate::flat::FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::Tuple(items) = value else {
        return Err(MarshalError::abi_violation("expected a tuple value"));
    };
    if items.len() != t.elems.len() {
        return Err(MarshalError::abi_violation("tuple arity mismatch"));
    }
    for (item, (ty, _)) in items.iter().zip(&t.elems) {
        ty.lower(sink, mem, item, opts)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::BumpAllocator;
    use std::sync::Arc;

    fn mem() -> Memory<BumpAllocator> {
        Memory::new(vec![0; 256], BumpAllocator::default())
    }

    fn name_age() -> Type {
        Type::Record(Arc::new(
            RecordType::new(vec![Field::new("name", Type::String), Field::new("age", Type::U32)]).unwrap(),
        ))
    }

    #[test]
    fn record_field_offsets() {
        let r = RecordType::new(vec![Field::new("a", Type::U8), Field::new("b", Type::U32)]).unwrap();
        assert_eq!(r.fields()[0].offset(), 0);
        assert_eq!(r.fields()[1].offset(), 4);
        assert_eq!(r.size(), 8);
        assert_eq!(r.alignment(), 4);
    }

    #[test]
    fn record_store_load_round_trip() {
        let ty = name_age();
        let mut m = mem();
        let opts = CanonicalOptions::default();
        let mut rec = HashMap::new();
        rec.insert("name".to_string(), Value::String("ana".into()));
        rec.insert("age".to_string(), Value::U32(30));
        let value = Value::Record(rec);
        ty.store(&mut m, 0, &value, &opts).unwrap();
        assert_eq!(ty.load(&m, 0, &opts).unwrap(), value);
    }

    #[test]
    fn tuple_arity_mismatch_rejected() {
        let ty = Type::Tuple(Arc::new(TupleType::new(vec![Type::U8, Type::U8]).unwrap()));
        let mut m = mem();
        let value = Value::Tuple(vec![Value::U8(1)]);
        assert!(ty.store(&mut m, 0, &value, &Default::default()).is_err());
    }
}
