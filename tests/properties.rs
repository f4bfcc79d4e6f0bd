//! Universal laws (§8): round-trip and layout invariants checked across a
//! spread of descriptor shapes, plus the numeric boundary cases.

use cm_marshal::descriptor::{Case, Field, RecordType, ResultType, VariantType};
use cm_marshal::memory::BumpAllocator;
use cm_marshal::value::Value;
use cm_marshal::{CanonicalOptions, FlatSink, FlatStream, FlatValue, Memory, Type};
use quickcheck::{quickcheck, TestResult};
use std::collections::HashMap;
use std::sync::Arc;

fn mem(size: usize) -> Memory<BumpAllocator> {
    Memory::new(vec![0; size], BumpAllocator::default())
}

fn store_load_round_trips<A: cm_marshal::GuestAllocator>(
    ty: &Type,
    value: &Value,
    mem: &mut Memory<A>,
    opts: &CanonicalOptions,
) -> bool {
    if ty.store(mem, 0, value, opts).is_err() {
        return false;
    }
    ty.load(mem, 0, opts).map(|v| &v == value).unwrap_or(false)
}

fn lower_lift_round_trips<A: cm_marshal::GuestAllocator>(
    ty: &Type,
    value: &Value,
    mem: &mut Memory<A>,
    opts: &CanonicalOptions,
) -> bool {
    let mut sink = FlatSink::new();
    if ty.lower(&mut sink, mem, value, opts).is_err() {
        return false;
    }
    if sink.len() != ty.flat_types().len() {
        return false;
    }
    let mut stream = sink.into_stream();
    let lifted = match ty.lift(mem, &mut stream, opts) {
        Ok(v) => v,
        Err(_) => return false,
    };
    stream.is_exhausted() && lifted == *value
}

quickcheck! {
    fn u8_store_load_round_trip(v: u8) -> bool {
        let ty = Type::U8;
        let mut m = mem(64);
        store_load_round_trips(&ty, &Value::U8(v), &mut m, &CanonicalOptions::default())
    }

    fn u32_lower_lift_round_trip(v: u32) -> bool {
        let ty = Type::U32;
        let mut m = mem(64);
        lower_lift_round_trips(&ty, &Value::U32(v), &mut m, &CanonicalOptions::default())
    }

    fn s32_store_load_round_trip(v: i32) -> bool {
        let ty = Type::S32;
        let mut m = mem(64);
        store_load_round_trips(&ty, &Value::S32(v), &mut m, &CanonicalOptions::default())
    }

    fn u64_lower_lift_round_trip(v: u64) -> bool {
        let ty = Type::U64;
        let mut m = mem(64);
        lower_lift_round_trips(&ty, &Value::U64(v), &mut m, &CanonicalOptions::default())
    }

    fn list_of_u32_store_load_round_trip(xs: Vec<u32>) -> bool {
        let ty = Type::list(Type::U32);
        let mut m = mem(4096);
        let value = Value::List(xs.into_iter().map(Value::U32).collect());
        store_load_round_trips(&ty, &value, &mut m, &CanonicalOptions::default())
    }

    fn string_store_load_round_trip(s: String) -> bool {
        let ty = Type::String;
        let mut m = mem(4096);
        store_load_round_trips(&ty, &Value::String(s), &mut m, &CanonicalOptions::default())
    }

    fn record_alignment_is_a_power_of_two_in_range(a: u8, b: u32) -> TestResult {
        let r = RecordType::new(vec![Field::new("a", Type::S8), Field::new("b", Type::U32)]).unwrap();
        let ty = Type::Record(Arc::new(r));
        if !matches!(ty.alignment(), 1 | 2 | 4 | 8) {
            return TestResult::failed();
        }
        let mut m = mem(64);
        let mut rec = HashMap::new();
        rec.insert("a".to_string(), Value::S8(a as i8));
        rec.insert("b".to_string(), Value::U32(b));
        let value = Value::Record(rec);
        TestResult::from_bool(store_load_round_trips(&ty, &value, &mut m, &CanonicalOptions::default()))
    }

    fn variant_ok_err_lower_lift_round_trip(ok: u32, use_err: bool) -> bool {
        let ty = Type::Result(Arc::new(ResultType::new(Some(Type::U32), Some(Type::U32)).unwrap()));
        let mut m = mem(64);
        let value = if use_err {
            Value::Result(Err(Some(Box::new(Value::U32(ok)))))
        } else {
            Value::Result(Ok(Some(Box::new(Value::U32(ok)))))
        };
        lower_lift_round_trips(&ty, &value, &mut m, &CanonicalOptions::default())
    }
}

#[test]
fn u8_256_rejected_255_accepted() {
    let ty = Type::U8;
    let mut bad = FlatStream::new([FlatValue::I32(256)]);
    assert!(ty.lift(&mem(4), &mut bad, &CanonicalOptions::default()).is_err());

    let mut good = FlatStream::new([FlatValue::I32(255)]);
    assert_eq!(
        ty.lift(&mem(4), &mut good, &CanonicalOptions::default()).unwrap(),
        Value::U8(255)
    );
}

#[test]
fn s8_boundaries_and_wire_reinterpretation() {
    let ty = Type::S8;
    let opts = CanonicalOptions::default();
    let mut m = mem(64);

    ty.store(&mut m, 0, &Value::S8(-128), &opts).unwrap();
    assert_eq!(ty.load(&m, 0, &opts).unwrap(), Value::S8(-128));

    let mut over = FlatStream::new([FlatValue::I32(128)]);
    assert!(ty.lift(&m, &mut over, &opts).is_err());

    let mut wire_255 = FlatStream::new([FlatValue::I32(255)]);
    assert_eq!(ty.lift(&m, &mut wire_255, &opts).unwrap(), Value::S8(-1));
}

#[test]
fn u32_max_round_trips_overflow_rejected() {
    let ty = Type::U32;
    let opts = CanonicalOptions::default();
    let mut m = mem(64);
    ty.store(&mut m, 0, &Value::U32(u32::MAX), &opts).unwrap();
    assert_eq!(ty.load(&m, 0, &opts).unwrap(), Value::U32(u32::MAX));

    let mut stream = FlatStream::new([FlatValue::I64(1i64 << 32)]);
    assert!(stream.next().unwrap().as_i32().is_err());
}

#[test]
fn char_surrogate_rejected_max_accepted() {
    let ty = Type::Char;
    let opts = CanonicalOptions::default();
    let mut m = mem(64);

    let mut surrogate = FlatStream::new([FlatValue::I32(0xD800)]);
    assert!(ty.lift(&m, &mut surrogate, &opts).is_err());

    ty.store(&mut m, 0, &Value::Char('\u{10FFFF}'), &opts).unwrap();
    assert_eq!(ty.load(&m, 0, &opts).unwrap(), Value::Char('\u{10FFFF}'));
}

#[test]
fn float_nan_canonicalizes_through_lower_lift() {
    let ty = Type::Float64;
    let opts = CanonicalOptions::default();
    let mut m = mem(64);
    let mut sink = FlatSink::new();
    ty.lower(&mut sink, &mut m, &Value::Float64(f64::NAN), &opts).unwrap();
    let mut stream = sink.into_stream();
    let lifted = ty.lift(&m, &mut stream, &opts).unwrap();
    assert_eq!(lifted, Value::Float64(f64::NAN));
}

#[test]
fn variant_narrow_case_pads_remaining_slots_with_zero() {
    let v = VariantType::new(vec![
        Case::new("small", Some(Type::U32)),
        Case::new("big", Some(Type::U64)),
    ])
    .unwrap();
    let ty = Type::Variant(Arc::new(v));
    assert_eq!(ty.flat_types(), vec![cm_marshal::FlatType::I32, cm_marshal::FlatType::I64]);

    let opts = CanonicalOptions::default();
    let mut m = mem(64);
    let value = cm_marshal::value::VariantValue::new(0, Some("small".into()), Some(Value::U32(9)));
    let value = Value::Variant(value);

    let mut sink = FlatSink::new();
    ty.lower(&mut sink, &mut m, &value, &opts).unwrap();
    assert_eq!(sink.as_slice()[0], FlatValue::I32(0));
    assert_eq!(sink.as_slice()[1], FlatValue::I64(9));

    let mut stream = sink.into_stream();
    assert_eq!(ty.lift(&m, &mut stream, &opts).unwrap(), value);
}
