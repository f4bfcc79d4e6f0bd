//! Type descriptors: the tagged-union core of the canonical ABI.
//!
//! Polymorphism here is a concrete enum over per-shape payload structs
//! (`RecordType`, `VariantType`, ...) rather than a trait object — the same
//! choice the teacher makes for `Opcode`/`PanicReason` — so the four
//! operations (`load`, `store`, `lift`, `lower`) are inherent methods that
//! `match self` once and dispatch into a leaf function.

mod buffer;
mod flags;
mod list;
mod primitive;
mod record;
mod resource;
mod string;
mod variant;

pub use buffer::BufferElem;
pub use flags::FlagsType;
pub use record::{Field, RecordType, TupleType};
pub use resource::ResourceType;
pub use variant::{Case, EnumType, OptionType, ResultType, VariantType};

use crate::error::Result;
use crate::flat::{FlatStream, FlatType};
use crate::memory::{GuestAllocator, Memory};
use crate::options::CanonicalOptions;
use crate::value::Value;
use std::sync::Arc;

/// The kind tag every descriptor carries, exhaustively matchable and
/// iterable for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Kind {
    /// `bool`.
    Bool,
    /// `u8`.
    U8,
    /// `u16`.
    U16,
    /// `u32`.
    U32,
    /// `u64`.
    U64,
    /// `s8`.
    S8,
    /// `s16`.
    S16,
    /// `s32`.
    S32,
    /// `s64`.
    S64,
    /// `float32`.
    Float32,
    /// `float64`.
    Float64,
    /// `char`.
    Char,
    /// `wstring`.
    String,
    /// Typed numeric buffer.
    Buffer,
    /// `list<T>`.
    List,
    /// Record.
    Record,
    /// Tuple.
    Tuple,
    /// Variant.
    Variant,
    /// `enum`.
    Enum,
    /// Flags bitset.
    Flags,
    /// `option<T>`.
    Option,
    /// `result<O, E>`.
    Result,
    /// Resource.
    Resource,
    /// `own<T>`.
    Own,
    /// `borrow<T>`.
    Borrow,
}

/// A type descriptor: kind, size, alignment, flat signature, and the four
/// canonical ABI operations.
#[derive(Debug, Clone)]
pub enum Type {
    /// `bool`.
    Bool,
    /// `u8`.
    U8,
    /// `u16`.
    U16,
    /// `u32`.
    U32,
    /// `u64`.
    U64,
    /// `s8`.
    S8,
    /// `s16`.
    S16,
    /// `s32`.
    S32,
    /// `s64`.
    S64,
    /// `float32`.
    Float32,
    /// `float64`.
    Float64,
    /// `char`.
    Char,
    /// `wstring`.
    String,
    /// A typed-buffer shortcut for one of the ten numeric element kinds.
    Buffer(BufferElem),
    /// `list<T>`.
    List(Arc<Type>),
    /// A record with named, ordered fields.
    Record(Arc<RecordType>),
    /// An unnamed, positional tuple.
    Tuple(Arc<TupleType>),
    /// A tagged union over named cases.
    Variant(Arc<VariantType>),
    /// A payload-free tagged union.
    Enum(Arc<EnumType>),
    /// A packed boolean bitfield.
    Flags(Arc<FlagsType>),
    /// `option<T>`.
    Option(Arc<OptionType>),
    /// `result<O, E>`.
    Result(Arc<ResultType>),
    /// A resource handle.
    Resource(Arc<ResourceType>),
    /// An owning resource handle.
    Own(Arc<ResourceType>),
    /// A non-owning resource handle.
    Borrow(Arc<ResourceType>),
}

impl Type {
    /// `list<u8>` as a generic list, not the typed-buffer shortcut.
    pub fn list(elem: Type) -> Self {
        Self::List(Arc::new(elem))
    }

    /// The kind tag.
    pub fn kind(&self) -> Kind {
        match self {
            Self::Bool => Kind::Bool,
            Self::U8 => Kind::U8,
            Self::U16 => Kind::U16,
            Self::U32 => Kind::U32,
            Self::U64 => Kind::U64,
            Self::S8 => Kind::S8,
            Self::S16 => Kind::S16,
            Self::S32 => Kind::S32,
            Self::S64 => Kind::S64,
            Self::Float32 => Kind::Float32,
            Self::Float64 => Kind::Float64,
            Self::Char => Kind::Char,
            Self::String => Kind::String,
            Self::Buffer(_) => Kind::Buffer,
            Self::List(_) => Kind::List,
            Self::Record(_) => Kind::Record,
            Self::Tuple(_) => Kind::Tuple,
            Self::Variant(_) => Kind::Variant,
            Self::Enum(_) => Kind::Enum,
            Self::Flags(_) => Kind::Flags,
            Self::Option(_) => Kind::Option,
            Self::Result(_) => Kind::Result,
            Self::Resource(_) => Kind::Resource,
            Self::Own(_) => Kind::Own,
            Self::Borrow(_) => Kind::Borrow,
        }
    }

    /// Footprint in linear memory, in bytes, including internal padding.
    pub fn size(&self) -> u32 {
        match self {
            Self::Bool | Self::U8 | Self::S8 => 1,
            Self::U16 | Self::S16 => 2,
            Self::U32 | Self::S32 | Self::Float32 | Self::Char => 4,
            Self::U64 | Self::S64 | Self::Float64 => 8,
            Self::String | Self::List(_) | Self::Buffer(_) => 8,
            Self::Record(r) => r.size(),
            Self::Tuple(t) => t.size(),
            Self::Flags(f) => f.size(),
            Self::Variant(v) => v.size(),
            Self::Enum(e) => e.size(),
            Self::Option(o) => o.variant().size(),
            Self::Result(r) => r.variant().size(),
            Self::Resource(_) | Self::Own(_) | Self::Borrow(_) => 4,
        }
    }

    /// Alignment; always a power of two in `{1,2,4,8}`.
    pub fn alignment(&self) -> u32 {
        match self {
            Self::Bool | Self::U8 | Self::S8 => 1,
            Self::U16 | Self::S16 => 2,
            Self::U32 | Self::S32 | Self::Float32 | Self::Char => 4,
            Self::U64 | Self::S64 | Self::Float64 => 8,
            Self::String | Self::List(_) | Self::Buffer(_) => 4,
            Self::Record(r) => r.alignment(),
            Self::Tuple(t) => t.alignment(),
            Self::Flags(f) => f.alignment(),
            Self::Variant(v) => v.alignment(),
            Self::Enum(e) => e.alignment(),
            Self::Option(o) => o.variant().alignment(),
            Self::Result(r) => r.variant().alignment(),
            Self::Resource(_) | Self::Own(_) | Self::Borrow(_) => 4,
        }
    }

    /// The ordered sequence of flat machine types this descriptor occupies.
    pub fn flat_types(&self) -> Vec<FlatType> {
        match self {
            Self::Bool
            | Self::U8
            | Self::U16
            | Self::U32
            | Self::S8
            | Self::S16
            | Self::S32
            | Self::Char
            | Self::Resource(_)
            | Self::Own(_)
            | Self::Borrow(_) => vec![FlatType::I32],
            Self::U64 | Self::S64 => vec![FlatType::I64],
            Self::Float32 => vec![FlatType::F32],
            Self::Float64 => vec![FlatType::F64],
            Self::String | Self::List(_) | Self::Buffer(_) => vec![FlatType::I32, FlatType::I32],
            Self::Record(r) => r.flat_types(),
            Self::Tuple(t) => t.flat_types(),
            Self::Flags(f) => f.flat_types(),
            Self::Variant(v) => v.flat_types(),
            Self::Enum(e) => e.flat_types(),
            Self::Option(o) => o.variant().flat_types(),
            Self::Result(r) => r.variant().flat_types(),
        }
    }

    /// Decode a value from linear memory at `ptr`.
    pub fn load<A: GuestAllocator>(&self, mem: &Memory<A>, ptr: u32, opts: &CanonicalOptions) -> Result<Value> {
        match self {
            Self::Bool | Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::S8 | Self::S16 | Self::S32
            | Self::S64 | Self::Float32 | Self::Float64 | Self::Char => primitive::load(self, mem, ptr),
            Self::String => string::load(mem, ptr, opts),
            Self::List(elem) => list::load_list(elem, mem, ptr, opts),
            Self::Buffer(elem) => buffer::load(*elem, mem, ptr),
            Self::Record(r) => record::load_record(r, mem, ptr, opts),
            Self::Tuple(t) => record::load_tuple(t, mem, ptr, opts),
            Self::Flags(f) => flags::load(f, mem, ptr),
            Self::Variant(v) => variant::load(v, mem, ptr, opts),
            Self::Enum(e) => variant::load_enum(e, mem, ptr),
            Self::Option(o) => variant::load_option(o, mem, ptr, opts),
            Self::Result(r) => variant::load_result(r, mem, ptr, opts),
            Self::Resource(_) | Self::Own(_) | Self::Borrow(_) => Ok(Value::Handle(mem.get_u32(ptr)?)),
        }
    }

    /// Encode a value into linear memory at `ptr`.
    pub fn store<A: GuestAllocator>(
        &self,
        mem: &mut Memory<A>,
        ptr: u32,
        value: &Value,
        opts: &CanonicalOptions,
    ) -> Result<()> {
        match self {
            Self::Bool | Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::S8 | Self::S16 | Self::S32
            | Self::S64 | Self::Float32 | Self::Float64 | Self::Char => primitive::store(self, mem, ptr, value),
            Self::String => string::store(mem, ptr, value, opts),
            Self::List(elem) => list::store_list(elem, mem, ptr, value, opts),
            Self::Buffer(elem) => buffer::store(*elem, mem, ptr, value),
            Self::Record(r) => record::store_record(r, mem, ptr, value, opts),
            Self::Tuple(t) => record::store_tuple(t, mem, ptr, value, opts),
            Self::Flags(f) => flags::store(f, mem, ptr, value),
            Self::Variant(v) => variant::store(v, mem, ptr, value, opts),
            Self::Enum(e) => variant::store_enum(e, mem, ptr, value),
            Self::Option(o) => variant::store_option(o, mem, ptr, value, opts),
            Self::Result(r) => variant::store_result(r, mem, ptr, value, opts),
            Self::Resource(_) | Self::Own(_) | Self::Borrow(_) => match value {
                Value::Handle(h) => mem.set_u32(ptr, *h),
                _ => Err(crate::error::MarshalError::abi_violation("expected a handle value")),
            },
        }
    }

    /// Decode a value by consuming slots from a flat stream.
    pub fn lift<A: GuestAllocator>(
        &self,
        mem: &Memory<A>,
        stream: &mut FlatStream,
        opts: &CanonicalOptions,
    ) -> Result<Value> {
        match self {
            Self::Bool | Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::S8 | Self::S16 | Self::S32
            | Self::S64 | Self::Float32 | Self::Float64 | Self::Char => primitive::lift(self, stream),
            Self::String => string::lift(mem, stream, opts),
            Self::List(elem) => list::lift_list(elem, mem, stream, opts),
            Self::Buffer(elem) => buffer::lift(*elem, mem, stream),
            Self::Record(r) => record::lift_record(r, mem, stream, opts),
            Self::Tuple(t) => record::lift_tuple(t, mem, stream, opts),
            Self::Flags(f) => flags::lift(f, stream),
            Self::Variant(v) => variant::lift(v, mem, stream, opts),
            Self::Enum(e) => variant::lift_enum(e, stream),
            Self::Option(o) => variant::lift_option(o, mem, stream, opts),
            Self::Result(r) => variant::lift_result(r, mem, stream, opts),
            Self::Resource(_) | Self::Own(_) | Self::Borrow(_) => {
                Ok(Value::Handle(stream.next()?.as_i32()? as u32))
            }
        }
    }

    /// Encode a value by appending slots to a flat sink.
    pub fn lower<A: GuestAllocator>(
        &self,
        sink: &mut crate::flat::FlatSink,
        mem: &mut Memory<A>,
        value: &Value,
        opts: &CanonicalOptions,
    ) -> Result<()> {
        match self {
            Self::Bool | Self::U8 | Self::U16 | Self::U32 | Self::U64 | Self::S8 | Self::S16 | Self::S32
            | Self::S64 | Self::Float32 | Self::Float64 | Self::Char => primitive::lower(self, sink, value),
            Self::String => string::lower(sink, mem, value, opts),
            Self::List(elem) => list::lower_list(elem, sink, mem, value, opts),
            Self::Buffer(elem) => buffer::lower(*elem, sink, mem, value),
            Self::Record(r) => record::lower_record(r, sink, mem, value, opts),
            Self::Tuple(t) => record::lower_tuple(t, sink, mem, value, opts),
            Self::Flags(f) => flags::lower(f, sink, value),
            Self::Variant(v) => variant::lower(v, sink, mem, value, opts),
            Self::Enum(e) => variant::lower_enum(e, sink, value),
            Self::Option(o) => variant::lower_option(o, sink, mem, value, opts),
            Self::Result(r) => variant::lower_result(r, sink, mem, value, opts),
            Self::Resource(_) | Self::Own(_) | Self::Borrow(_) => match value {
                Value::Handle(h) => {
                    sink.push(crate::flat::FlatValue::I32(*h as i32));
                    Ok(())
                }
                _ => Err(crate::error::MarshalError::abi_violation("expected a handle value")),
            },
        }
    }
}

/// Round `n` up to the next multiple of `a` (`a` a power of two).
pub(crate) const fn align_up(n: u32, a: u32) -> u32 {
    let mask = a - 1;
    (n + mask) & !mask
}
