//! Flags: a packed boolean bitfield, storage width chosen by declared
//! field count.

use crate::consts::FLAGS_BITS_PER_WORD;
use crate::error::{MarshalError, Result};
use crate::flat::{FlatStream, FlatType, FlatValue};
use crate::memory::{GuestAllocator, Memory};
use crate::value::{FlagsValue, Value};
use std::sync::Arc;

/// Storage width a [`FlagsType`] picks for its declared field count, mirroring
/// the teacher's explicit tagged-enum treatment of polymorphic storage
/// (`FlagsStorage`) rather than branching on the count inline everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagsStorage {
    None,
    U8,
    U16,
    U32,
    Words(u32),
}

impl FlagsStorage {
    fn for_count(n: usize) -> Self {
        match n {
            0 => Self::None,
            1..=8 => Self::U8,
            9..=16 => Self::U16,
            17..=32 => Self::U32,
            _ => Self::Words((n as u32).div_ceil(FLAGS_BITS_PER_WORD)),
        }
    }

    fn size(self) -> u32 {
        match self {
            Self::None => 0,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::Words(n) => n * 4,
        }
    }

    fn alignment(self) -> u32 {
        match self {
            Self::None => 1,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::Words(_) => 4,
        }
    }

    fn word_count(self) -> u32 {
        match self {
            Self::None => 0,
            Self::U8 | Self::U16 | Self::U32 => 1,
            Self::Words(n) => n,
        }
    }
}

/// A flags bitset descriptor: declared field names plus the storage width
/// they select.
#[derive(Debug, Clone)]
pub struct FlagsType {
    names: Arc<[String]>,
    storage: FlagsStorage,
}

impl FlagsType {
    /// Declare a flags set from its field names, in declaration order.
    pub fn new(names: Vec<String>) -> Self {
        let storage = FlagsStorage::for_count(names.len());
        Self { names: names.into(), storage }
    }

    /// Declared field names, in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub(super) fn size(&self) -> u32 {
        self.storage.size()
    }

    pub(super) fn alignment(&self) -> u32 {
        self.storage.alignment()
    }

    pub(super) fn flat_types(&self) -> Vec<FlatType> {
        vec![FlatType::I32; self.storage.word_count() as usize]
    }
}

fn to_value(f: &FlagsType, words: Vec<u32>) -> Value {
    Value::Flags(FlagsValue::from_words(f.names.clone(), words))
}

pub(super) fn load<A: GuestAllocator>(f: &FlagsType, mem: &Memory<A>, ptr: u32) -> Result<Value> {
    let words = match f.storage {
        FlagsStorage::None => vec![],
        FlagsStorage::U8 => vec![mem.get_u8(ptr)? as u32],
        FlagsStorage::U16 => vec![mem.get_u16(ptr)? as u32],
        FlagsStorage::U32 => vec![mem.get_u32(ptr)?],
        FlagsStorage::Words(n) => (0..n).map(|i| mem.get_u32(ptr + i * 4)).collect::<Result<_>>()?,
    };
    Ok(to_value(f, words))
}

pub(super) fn store<A: GuestAllocator>(f: &FlagsType, mem: &mut Memory<A>, ptr: u32, value: &Value) -> Result<()> {
    let Value::Flags(flags) = value else {
        return Err(MarshalError::abi_violation("expected a flags value"));
    };
    let words = flags.words();
    match f.storage {
        FlagsStorage::None => Ok(()),
        FlagsStorage::U8 => mem.set_u8(ptr, words.first().copied().unwrap_or(0) as u8),
        FlagsStorage::U16 => mem.set_u16(ptr, words.first().copied().unwrap_or(0) as u16),
        FlagsStorage::U32 => mem.set_u32(ptr, words.first().copied().unwrap_or(0)),
        FlagsStorage::Words(n) => {
            for i in 0..n {
                mem.set_u32(ptr + i * 4, words.get(i as usize).copied().unwrap_or(0))?;
            }
            Ok(())
        }
    }
}

pub(super) fn lift(f: &FlagsType, stream: &mut FlatStream) -> Result<Value> {
    let n = f.storage.word_count();
    let mut words = Vec::with_capacity(n as usize);
    for _ in 0..n {
        words.push(stream.next()?.as_i32()? as u32);
    }
    Ok(to_value(f, words))
}

pub(super) fn lower(f: &FlagsType, sink: &mut crate::flat::FlatSink, value: &Value) -> Result<()> {
    let Value::Flags(flags) = value else {
        return Err(MarshalError::abi_violation("expected a flags value"));
    };
    for i in 0..f.storage.word_count() {
        sink.push(FlatValue::I32(flags.words().get(i as usize).copied().unwrap_or(0) as i32));
    }
    Ok(())
}
