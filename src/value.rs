//! The native, owned sum type every descriptor decodes into (and encodes
//! from). Generated bindings refine this into concrete types without
//! re-encoding, per the design notes.

use std::collections::HashMap;
use std::sync::Arc;

/// A decoded Component-Model value in its generic, descriptor-independent
/// form.
#[derive(Debug, Clone)]
pub enum Value {
    /// `bool`.
    Bool(bool),
    /// `u8`.
    U8(u8),
    /// `u16`.
    U16(u16),
    /// `u32`.
    U32(u32),
    /// `u64`.
    U64(u64),
    /// `s8`.
    S8(i8),
    /// `s16`.
    S16(i16),
    /// `s32`.
    S32(i32),
    /// `s64`.
    S64(i64),
    /// `float32`.
    Float32(f32),
    /// `float64`.
    Float64(f64),
    /// `char`, stored as a single Unicode scalar value.
    Char(char),
    /// `wstring`.
    String(String),
    /// `list<T>`.
    List(Vec<Value>),
    /// One of the eight typed-buffer shapes; bulk numeric data plus the
    /// element width/signedness tag it was decoded as.
    Buffer(TypedBuffer),
    /// A record, keyed by declared field name. Field order for `lower` is
    /// always taken from the descriptor, not from this map's iteration
    /// order.
    Record(HashMap<String, Value>),
    /// A tuple, positional.
    Tuple(Vec<Value>),
    /// A flags bitset paired with its declared field names.
    Flags(FlagsValue),
    /// A general variant (including `enum`-like payload-free cases).
    Variant(VariantValue),
    /// An `option<T>` collapsed to `T | null` (`keep_option = false`).
    Option(Option<Box<Value>>),
    /// A `result<O, E>`.
    Result(Result<Option<Box<Value>>, Option<Box<Value>>>),
    /// An `enum` case index.
    Enum(u32),
    /// An opaque 32-bit resource/own/borrow handle.
    Handle(u32),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a == b,
            (U8(a), U8(b)) => a == b,
            (U16(a), U16(b)) => a == b,
            (U32(a), U32(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            (S8(a), S8(b)) => a == b,
            (S16(a), S16(b)) => a == b,
            (S32(a), S32(b)) => a == b,
            (S64(a), S64(b)) => a == b,
            // Bit-compared so a canonicalized NaN round-trips as "equal",
            // matching the store/load and lower/lift invariants (§8) rather
            // than IEEE-754 equality.
            (Float32(a), Float32(b)) => a.to_bits() == b.to_bits(),
            (Float64(a), Float64(b)) => a.to_bits() == b.to_bits(),
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Buffer(a), Buffer(b)) => a == b,
            (Record(a), Record(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (Flags(a), Flags(b)) => a == b,
            (Variant(a), Variant(b)) => a == b,
            (Option(a), Option(b)) => a == b,
            (Result(a), Result(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (Handle(a), Handle(b)) => a == b,
            _ => false,
        }
    }
}

/// A bulk numeric array view, wire-compatible with `list<T>` of the matching
/// element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    /// `buffer<s8>`.
    I8(Vec<i8>),
    /// `buffer<s16>`.
    I16(Vec<i16>),
    /// `buffer<s32>`.
    I32(Vec<i32>),
    /// `buffer<s64>`.
    I64(Vec<i64>),
    /// `buffer<u8>`.
    U8(Vec<u8>),
    /// `buffer<u16>`.
    U16(Vec<u16>),
    /// `buffer<u32>`.
    U32(Vec<u32>),
    /// `buffer<u64>`.
    U64(Vec<u64>),
    /// `buffer<float32>`.
    F32(Vec<f32>),
    /// `buffer<float64>`.
    F64(Vec<f64>),
}

/// A decoded flags bitset, with its declared field names preserved for
/// ordered iteration and for the `entries()` view.
///
/// Per the declared-order open question (§4.5), equality requires both the
/// same declared names *in the same order* and the same underlying bits;
/// two flag values with identical bits but a different declared field list
/// are never equal.
#[derive(Debug, Clone)]
pub struct FlagsValue {
    names: Arc<[String]>,
    bits: Vec<u32>,
}

impl FlagsValue {
    /// Construct a flags value with all bits clear.
    pub fn new(names: Arc<[String]>) -> Self {
        let words = (names.len() as u32).div_ceil(crate::consts::FLAGS_BITS_PER_WORD).max(if names.is_empty() { 0 } else { 1 });
        Self {
            names,
            bits: vec![0; words as usize],
        }
    }

    /// Build directly from pre-computed storage words.
    pub fn from_words(names: Arc<[String]>, bits: Vec<u32>) -> Self {
        Self { names, bits }
    }

    /// The declared field names, in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The raw storage words, little-endian word order.
    pub fn words(&self) -> &[u32] {
        &self.bits
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Read the flag named `name`.
    pub fn get(&self, name: &str) -> Option<bool> {
        let i = self.index_of(name)?;
        let word = i / crate::consts::FLAGS_BITS_PER_WORD as usize;
        let mask = 1u32 << (i as u32 % crate::consts::FLAGS_BITS_PER_WORD);
        Some(self.bits[word] & mask != 0)
    }

    /// Set or clear the flag named `name`; no-op if the name isn't declared.
    pub fn set(&mut self, name: &str, value: bool) {
        if let Some(i) = self.index_of(name) {
            let word = i / crate::consts::FLAGS_BITS_PER_WORD as usize;
            let mask = 1u32 << (i as u32 % crate::consts::FLAGS_BITS_PER_WORD);
            if value {
                self.bits[word] |= mask;
            } else {
                self.bits[word] &= !mask;
            }
        }
    }

    /// Iterate `(name, value)` pairs in declared-name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(move |(i, name)| (name.as_str(), self.get(name).unwrap_or(false) && i < self.names.len()))
    }
}

impl PartialEq for FlagsValue {
    fn eq(&self, other: &Self) -> bool {
        self.names.len() == other.names.len()
            && self.names.iter().zip(other.names.iter()).all(|(a, b)| a == b)
            && self.bits == other.bits
    }
}

/// A decoded variant/result value: which case was active, and its payload
/// (if that case carries one).
#[derive(Debug, Clone, PartialEq)]
pub struct VariantValue {
    /// The numeric discriminant of the active case.
    pub discriminant: u32,
    /// The declared name of the active case, if the variant names its cases.
    pub case_name: Option<String>,
    /// The case's payload, if any.
    pub payload: Option<Box<Value>>,
}

impl VariantValue {
    /// Build a variant value for a payload-carrying case.
    pub fn new(discriminant: u32, case_name: Option<String>, payload: Option<Value>) -> Self {
        Self {
            discriminant,
            case_name,
            payload: payload.map(Box::new),
        }
    }
}
