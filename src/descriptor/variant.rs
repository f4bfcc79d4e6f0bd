//! Variant, enum, option, result: tagged unions over a discriminant plus an
//! optional per-case payload.

use super::{align_up, Type};
use crate::consts::{DISCRIMINANT_U16_MAX_CASES, DISCRIMINANT_U32_MAX_CASES, DISCRIMINANT_U8_MAX_CASES};
use crate::error::{MarshalError, Result};
use crate::flat::{widen, CoercionIter, FlatSink, FlatStream, FlatType, FlatValue};
use crate::memory::{GuestAllocator, Memory};
use crate::options::CanonicalOptions;
use crate::value::{Value, VariantValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscriminantWidth {
    U8,
    U16,
    U32,
}

impl DiscriminantWidth {
    fn for_case_count(n: usize) -> Result<Self> {
        let n = n as u64;
        if n == 0 {
            return Err(MarshalError::abi_violation("variant must declare at least one case"));
        }
        if n <= DISCRIMINANT_U8_MAX_CASES {
            Ok(Self::U8)
        } else if n <= DISCRIMINANT_U16_MAX_CASES {
            Ok(Self::U16)
        } else if n <= DISCRIMINANT_U32_MAX_CASES {
            Ok(Self::U32)
        } else {
            Err(MarshalError::abi_violation("too many variant cases (> 2^32)"))
        }
    }

    fn size(self) -> u32 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    fn alignment(self) -> u32 {
        self.size()
    }
}

fn load_discriminant<A: GuestAllocator>(width: DiscriminantWidth, mem: &Memory<A>, ptr: u32) -> Result<u32> {
    Ok(match width {
        DiscriminantWidth::U8 => mem.get_u8(ptr)? as u32,
        DiscriminantWidth::U16 => mem.get_u16(ptr)? as u32,
        DiscriminantWidth::U32 => mem.get_u32(ptr)?,
    })
}

fn store_discriminant<A: GuestAllocator>(
    width: DiscriminantWidth,
    mem: &mut Memory<A>,
    ptr: u32,
    discriminant: u32,
) -> Result<()> {
    match width {
        DiscriminantWidth::U8 => mem.set_u8(ptr, discriminant as u8),
        DiscriminantWidth::U16 => mem.set_u16(ptr, discriminant as u16),
        DiscriminantWidth::U32 => mem.set_u32(ptr, discriminant),
    }
}

/// Whether a single flat slot of type `have` can be widened to `want`
/// without loss, per the join/reinterpret rules of §4.6.
fn can_widen(have: FlatType, want: FlatType) -> bool {
    use FlatType::*;
    have == want || matches!((have, want), (I32, I64) | (F32, I32) | (F32, I64) | (F64, I64))
}

fn join_types(cases: &[Case]) -> Vec<FlatType> {
    let max_len = cases.iter().map(|c| c.want_flat_types().len()).max().unwrap_or(0);
    (0..max_len)
        .map(|i| {
            let mut needs: Vec<FlatType> =
                cases.iter().filter_map(|c| c.want_flat_types().get(i).copied()).collect();
            needs.dedup();
            if needs.len() == 1 {
                needs[0]
            } else if needs.len() == 2 && needs.contains(&FlatType::I32) && needs.contains(&FlatType::F32) {
                FlatType::I32
            } else {
                FlatType::I64
            }
        })
        .collect()
}

/// One named case of a [`VariantType`], with an optional payload descriptor.
#[derive(Debug, Clone)]
pub struct Case {
    name: Option<String>,
    payload: Option<Type>,
}

impl Case {
    /// Declare a named case, with or without a payload.
    pub fn new(name: impl Into<String>, payload: Option<Type>) -> Self {
        Self { name: Some(name.into()), payload }
    }

    /// The case's own flat shape, had it been lowered alone.
    fn want_flat_types(&self) -> Vec<FlatType> {
        self.payload.as_ref().map(Type::flat_types).unwrap_or_default()
    }
}

/// A tagged union over named cases: the general `variant` shape underlying
/// `variant`, `option`, and `result`.
#[derive(Debug, Clone)]
pub struct VariantType {
    cases: Vec<Case>,
    discriminant: DiscriminantWidth,
    joined: Vec<FlatType>,
    payload_alignment: u32,
    payload_size: u32,
}

impl VariantType {
    /// Build a variant descriptor: computes discriminant width, payload
    /// layout, and the per-slot join table, rejecting a case whose natural
    /// flat shape cannot be widened into the computed join (a construction-
    /// time ABI violation, not a latent lowering bug).
    pub fn new(cases: Vec<Case>) -> Result<Self> {
        let discriminant = DiscriminantWidth::for_case_count(cases.len())?;
        let payload_alignment = cases
            .iter()
            .filter_map(|c| c.payload.as_ref().map(Type::alignment))
            .max()
            .unwrap_or(1);
        let payload_size = cases
            .iter()
            .filter_map(|c| c.payload.as_ref().map(Type::size))
            .max()
            .unwrap_or(0);
        let joined = join_types(&cases);
        for case in &cases {
            let want = case.want_flat_types();
            for (i, &w) in want.iter().enumerate() {
                let j = joined[i];
                debug_assert!(can_widen(w, j), "case flat type must widen into the joined slot type");
                if !can_widen(w, j) {
                    return Err(MarshalError::abi_violation(format!(
                        "case slot {i} of type {w} cannot widen into joined type {j}"
                    )));
                }
            }
        }
        Ok(Self { cases, discriminant, joined, payload_alignment, payload_size })
    }

    /// Declared cases, in declaration order (their index is their
    /// discriminant).
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub(super) fn size(&self) -> u32 {
        align_up(self.discriminant.size(), self.payload_alignment) + self.payload_size
    }

    pub(super) fn alignment(&self) -> u32 {
        self.discriminant.alignment().max(self.payload_alignment)
    }

    pub(super) fn flat_types(&self) -> Vec<FlatType> {
        let mut out = vec![FlatType::I32];
        out.extend(self.joined.iter().copied());
        out
    }

    fn payload_offset(&self) -> u32 {
        align_up(self.discriminant.size(), self.payload_alignment)
    }
}

fn case_for(cases: &[Case], discriminant: u32) -> Result<&Case> {
    cases
        .get(discriminant as usize)
        .ok_or_else(|| MarshalError::abi_violation(format!("discriminant {discriminant} out of range")))
}

fn load_generic<A: GuestAllocator>(
    v: &VariantType,
    mem: &Memory<A>,
    ptr: u32,
    opts: &CanonicalOptions,
) -> Result<(u32, Option<String>, Option<Value>)> {
    let discriminant = load_discriminant(v.discriminant, mem, ptr)?;
    let case = case_for(&v.cases, discriminant)?;
    let payload = match &case.payload {
        Some(ty) => Some(ty.load(mem, ptr + v.payload_offset(), opts)?),
        None => None,
    };
    Ok((discriminant, case.name.clone(), payload))
}

fn store_generic<A: GuestAllocator>(
    v: &VariantType,
    mem: &mut Memory<A>,
    ptr: u32,
    discriminant: u32,
    payload: Option<&Value>,
    opts: &CanonicalOptions,
) -> Result<()> {
    let case = case_for(&v.cases, discriminant)?;
    store_discriminant(v.discriminant, mem, ptr, discriminant)?;
    match (&case.payload, payload) {
        (Some(ty), Some(value)) => ty.store(mem, ptr + v.payload_offset(), value, opts),
        (None, None) => Ok(()),
        _ => Err(MarshalError::abi_violation("case payload presence mismatch")),
    }
}

fn lift_generic<A: GuestAllocator>(
    v: &VariantType,
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<(u32, Option<String>, Option<Value>)> {
    let discriminant = stream.next()?.as_i32()? as u32;
    let case = case_for(&v.cases, discriminant)?;
    let want = case.want_flat_types();
    let mut coerced = Vec::with_capacity(want.len());
    {
        let mut coercer = CoercionIter::new(stream, want.clone());
        for _ in 0..want.len() {
            coerced.push(coercer.next()?);
        }
    }
    for _ in want.len()..v.joined.len() {
        stream.next()?;
    }
    let payload = match &case.payload {
        Some(ty) => {
            let mut sub = FlatStream::new(coerced);
            Some(ty.lift(mem, &mut sub, opts)?)
        }
        None => None,
    };
    Ok((discriminant, case.name.clone(), payload))
}

fn lower_generic<A: GuestAllocator>(
    v: &VariantType,
    sink: &mut FlatSink,
    mem: &mut Memory<A>,
    discriminant: u32,
    payload: Option<&Value>,
    opts: &CanonicalOptions,
) -> Result<()> {
    let case = case_for(&v.cases, discriminant)?;
    sink.push(FlatValue::I32(discriminant as i32));
    let mut sub = FlatSink::new();
    match (&case.payload, payload) {
        (Some(ty), Some(value)) => ty.lower(&mut sub, mem, value, opts)?,
        (None, None) => {}
        _ => return Err(MarshalError::abi_violation("case payload presence mismatch")),
    }
    let slots = sub.as_slice();
    for (i, &ty) in v.joined.iter().enumerate() {
        if let Some(&slot) = slots.get(i) {
            sink.push(widen(slot, ty));
        } else {
            sink.push(FlatValue::zero(ty));
        }
    }
    Ok(())
}

pub(super) fn load<A: GuestAllocator>(v: &VariantType, mem: &Memory<A>, ptr: u32, opts: &CanonicalOptions) -> Result<Value> {
    let (discriminant, case_name, payload) = load_generic(v, mem, ptr, opts)?;
    Ok(Value::Variant(VariantValue::new(discriminant, case_name, payload)))
}

pub(super) fn store<A: GuestAllocator>(
    v: &VariantType,
    mem: &mut Memory<A>,
    ptr: u32,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::Variant(vv) = value else {
        return Err(MarshalError::abi_violation("expected a variant value"));
    };
    store_generic(v, mem, ptr, vv.discriminant, vv.payload.as_deref(), opts)
}

pub(super) fn lift<A: GuestAllocator>(
    v: &VariantType,
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let (discriminant, case_name, payload) = lift_generic(v, mem, stream, opts)?;
    Ok(Value::Variant(VariantValue::new(discriminant, case_name, payload)))
}

pub(super) fn lower<A: GuestAllocator>(
    v: &VariantType,
    sink: &mut FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let Value::Variant(vv) = value else {
        return Err(MarshalError::abi_violation("expected a variant value"));
    };
    lower_generic(v, sink, mem, vv.discriminant, vv.payload.as_deref(), opts)
}

/// A payload-free tagged union: same discriminant sizing as [`VariantType`],
/// no payload region.
#[derive(Debug, Clone)]
pub struct EnumType {
    case_names: Vec<String>,
    discriminant: DiscriminantWidth,
}

impl EnumType {
    /// Declare an enum from its case names, in declaration order.
    pub fn new(case_names: Vec<String>) -> Result<Self> {
        let discriminant = DiscriminantWidth::for_case_count(case_names.len())?;
        Ok(Self { case_names, discriminant })
    }

    /// Declared case names, in declaration order.
    pub fn case_names(&self) -> &[String] {
        &self.case_names
    }

    pub(super) fn size(&self) -> u32 {
        self.discriminant.size()
    }

    pub(super) fn alignment(&self) -> u32 {
        self.discriminant.alignment()
    }

    pub(super) fn flat_types(&self) -> Vec<FlatType> {
        vec![FlatType::I32]
    }
}

fn check_enum_range(e: &EnumType, discriminant: u32) -> Result<()> {
    if (discriminant as usize) >= e.case_names.len() {
        return Err(MarshalError::abi_violation(format!(
            "enum discriminant {discriminant} out of range (0..{})",
            e.case_names.len()
        )));
    }
    Ok(())
}

pub(super) fn load_enum<A: GuestAllocator>(e: &EnumType, mem: &Memory<A>, ptr: u32) -> Result<Value> {
    let discriminant = load_discriminant(e.discriminant, mem, ptr)?;
    check_enum_range(e, discriminant)?;
    Ok(Value::Enum(discriminant))
}

pub(super) fn store_enum<A: GuestAllocator>(e: &EnumType, mem: &mut Memory<A>, ptr: u32, value: &Value) -> Result<()> {
    let Value::Enum(discriminant) = value else {
        return Err(MarshalError::abi_violation("expected an enum value"));
    };
    check_enum_range(e, *discriminant)?;
    store_discriminant(e.discriminant, mem, ptr, *discriminant)
}

pub(super) fn lift_enum(e: &EnumType, stream: &mut FlatStream) -> Result<Value> {
    let discriminant = stream.next()?.as_i32()? as u32;
    check_enum_range(e, discriminant)?;
    Ok(Value::Enum(discriminant))
}

pub(super) fn lower_enum(e: &EnumType, sink: &mut FlatSink, value: &Value) -> Result<()> {
    let Value::Enum(discriminant) = value else {
        return Err(MarshalError::abi_violation("expected an enum value"));
    };
    check_enum_range(e, *discriminant)?;
    sink.push(FlatValue::I32(*discriminant as i32));
    Ok(())
}

const NONE_DISCRIMINANT: u32 = 0;
const SOME_DISCRIMINANT: u32 = 1;

/// `option<T>`: two cases, `none` and `some(T)`.
#[derive(Debug, Clone)]
pub struct OptionType {
    variant: VariantType,
}

impl OptionType {
    /// Declare `option<T>`.
    pub fn new(some: Type) -> Result<Self> {
        let variant = VariantType::new(vec![Case::new("none", None), Case::new("some", Some(some))])?;
        Ok(Self { variant })
    }

    /// The underlying two-case variant.
    pub fn variant(&self) -> &VariantType {
        &self.variant
    }
}

fn unpack_option_value(opts: &CanonicalOptions, value: &Value) -> Result<(u32, Option<Value>)> {
    match (opts.keep_option, value) {
        (false, Value::Option(inner)) => match inner {
            Some(v) => Ok((SOME_DISCRIMINANT, Some((**v).clone()))),
            None => Ok((NONE_DISCRIMINANT, None)),
        },
        (true, Value::Variant(vv)) => Ok((vv.discriminant, vv.payload.as_deref().cloned())),
        (false, Value::Variant(_)) => Err(MarshalError::OptionRepresentationMismatch(
            "keep_option=false but received a tagged variant value".into(),
        )),
        (true, Value::Option(_)) => Err(MarshalError::OptionRepresentationMismatch(
            "keep_option=true but received an unpacked value".into(),
        )),
        _ => Err(MarshalError::abi_violation("expected an option value")),
    }
}

fn pack_option_value(opts: &CanonicalOptions, discriminant: u32, case_name: Option<String>, payload: Option<Value>) -> Value {
    if opts.keep_option {
        Value::Variant(VariantValue::new(discriminant, case_name, payload))
    } else {
        Value::Option(payload.map(Box::new))
    }
}

pub(super) fn load_option<A: GuestAllocator>(
    o: &OptionType,
    mem: &Memory<A>,
    ptr: u32,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let (discriminant, case_name, payload) = load_generic(&o.variant, mem, ptr, opts)?;
    Ok(pack_option_value(opts, discriminant, case_name, payload))
}

pub(super) fn store_option<A: GuestAllocator>(
    o: &OptionType,
    mem: &mut Memory<A>,
    ptr: u32,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let (discriminant, payload) = unpack_option_value(opts, value)?;
    store_generic(&o.variant, mem, ptr, discriminant, payload.as_ref(), opts)
}

pub(super) fn lift_option<A: GuestAllocator>(
    o: &OptionType,
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let (discriminant, case_name, payload) = lift_generic(&o.variant, mem, stream, opts)?;
    Ok(pack_option_value(opts, discriminant, case_name, payload))
}

pub(super) fn lower_option<A: GuestAllocator>(
    o: &OptionType,
    sink: &mut FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let (discriminant, payload) = unpack_option_value(opts, value)?;
    lower_generic(&o.variant, sink, mem, discriminant, payload.as_ref(), opts)
}

const OK_DISCRIMINANT: u32 = 0;
const ERR_DISCRIMINANT: u32 = 1;

/// `result<O, E>`: two cases, `ok(O)` and `err(E)`, either payload optional.
#[derive(Debug, Clone)]
pub struct ResultType {
    variant: VariantType,
}

impl ResultType {
    /// Declare `result<O, E>`; either payload type may be omitted.
    pub fn new(ok: Option<Type>, err: Option<Type>) -> Result<Self> {
        let variant = VariantType::new(vec![Case::new("ok", ok), Case::new("err", err)])?;
        Ok(Self { variant })
    }

    /// The underlying two-case variant.
    pub fn variant(&self) -> &VariantType {
        &self.variant
    }
}

fn unpack_result_value(value: &Value) -> Result<(u32, Option<Value>)> {
    match value {
        Value::Result(Ok(v)) => Ok((OK_DISCRIMINANT, v.as_deref().cloned())),
        Value::Result(Err(v)) => Ok((ERR_DISCRIMINANT, v.as_deref().cloned())),
        _ => Err(MarshalError::abi_violation("expected a result value")),
    }
}

fn pack_result_value(discriminant: u32, payload: Option<Value>) -> Result<Value> {
    match discriminant {
        OK_DISCRIMINANT => Ok(Value::Result(Ok(payload.map(Box::new)))),
        ERR_DISCRIMINANT => Ok(Value::Result(Err(payload.map(Box::new)))),
        other => Err(MarshalError::abi_violation(format!("invalid result discriminant {other}"))),
    }
}

pub(super) fn load_result<A: GuestAllocator>(
    r: &ResultType,
    mem: &Memory<A>,
    ptr: u32,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let (discriminant, _, payload) = load_generic(&r.variant, mem, ptr, opts)?;
    pack_result_value(discriminant, payload)
}

pub(super) fn store_result<A: GuestAllocator>(
    r: &ResultType,
    mem: &mut Memory<A>,
    ptr: u32,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let (discriminant, payload) = unpack_result_value(value)?;
    store_generic(&r.variant, mem, ptr, discriminant, payload.as_ref(), opts)
}

pub(super) fn lift_result<A: GuestAllocator>(
    r: &ResultType,
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<Value> {
    let (discriminant, _, payload) = lift_generic(&r.variant, mem, stream, opts)?;
    pack_result_value(discriminant, payload)
}

pub(super) fn lower_result<A: GuestAllocator>(
    r: &ResultType,
    sink: &mut FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    let (discriminant, payload) = unpack_result_value(value)?;
    lower_generic(&r.variant, sink, mem, discriminant, payload.as_ref(), opts)
}
