//! Literal end-to-end scenarios from the canonical ABI's worked examples.

use cm_marshal::descriptor::{Case, Field, RecordType, ResultType, VariantType};
use cm_marshal::function::{call_wasm, FunctionType, Param};
use cm_marshal::memory::BumpAllocator;
use cm_marshal::value::{FlagsValue, TypedBuffer, Value};
use cm_marshal::{CanonicalOptions, FlatValue, Memory, Type};
use std::collections::HashMap;
use std::sync::Arc;

fn mem(size: usize) -> Memory<BumpAllocator> {
    Memory::new(vec![0; size], BumpAllocator::default())
}

#[test]
fn list_of_u8() {
    let ty = Type::list(Type::U8);
    let mut m = mem(64);
    let opts = CanonicalOptions::default();
    let value = Value::List(vec![Value::U8(1), Value::U8(2), Value::U8(3)]);

    ty.store(&mut m, 0, &value, &opts).unwrap();
    let data_ptr = m.get_u32(0).unwrap();
    let len = m.get_u32(4).unwrap();
    assert_eq!(len, 3);
    assert_eq!(m.read_bytes(data_ptr, 3).unwrap(), &[1, 2, 3]);
    assert_eq!(ty.load(&m, 0, &opts).unwrap(), value);
}

#[test]
fn utf8_string_hello_with_diacritic() {
    let ty = Type::String;
    let mut m = mem(64);
    let opts = CanonicalOptions::default();
    let value = Value::String("héllo".to_string());

    ty.store(&mut m, 0, &value, &opts).unwrap();
    let data_ptr = m.get_u32(0).unwrap();
    let code_units = m.get_u32(4).unwrap();
    assert_eq!(code_units, 6);
    assert_eq!(m.read_bytes(data_ptr, 6).unwrap(), &[0x68, 0xC3, 0xA9, 0x6C, 0x6C, 0x6F]);
    assert_eq!(ty.load(&m, 0, &opts).unwrap(), value);
}

#[test]
fn record_name_age() {
    let ty = Type::Record(Arc::new(
        RecordType::new(vec![Field::new("name", Type::String), Field::new("age", Type::U32)]).unwrap(),
    ));
    let Type::Record(r) = &ty else { unreachable!() };
    assert_eq!(r.fields()[0].offset(), 0);
    assert_eq!(r.fields()[1].offset(), 8);
    assert_eq!(ty.size(), 12);
    assert_eq!(ty.alignment(), 4);
    assert_eq!(
        ty.flat_types(),
        vec![cm_marshal::FlatType::I32, cm_marshal::FlatType::I32, cm_marshal::FlatType::I32]
    );

    let mut m = mem(64);
    let opts = CanonicalOptions::default();
    let mut fields = HashMap::new();
    fields.insert("name".to_string(), Value::String("a".to_string()));
    fields.insert("age".to_string(), Value::U32(7));
    let value = Value::Record(fields);

    let mut sink = cm_marshal::FlatSink::new();
    ty.lower(&mut sink, &mut m, &value, &opts).unwrap();
    let slots = sink.as_slice();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[2], FlatValue::I32(7));
}

#[test]
fn ok_u32_err_f32_variant() {
    let v = VariantType::new(vec![Case::new("ok", Some(Type::U32)), Case::new("err", Some(Type::Float32))]).unwrap();
    let ty = Type::Variant(Arc::new(v));
    assert_eq!(ty.size(), 8);
    assert_eq!(ty.flat_types(), vec![cm_marshal::FlatType::I32, cm_marshal::FlatType::I32]);

    let mut m = mem(64);
    let opts = CanonicalOptions::default();
    let value = Value::Variant(cm_marshal::value::VariantValue::new(0, Some("ok".into()), Some(Value::U32(5))));

    let mut sink = cm_marshal::FlatSink::new();
    ty.lower(&mut sink, &mut m, &value, &opts).unwrap();
    assert_eq!(sink.as_slice(), &[FlatValue::I32(0), FlatValue::I32(5)]);

    let mut stream = sink.into_stream();
    assert_eq!(ty.lift(&m, &mut stream, &opts).unwrap(), value);
}

#[test]
fn twenty_six_flags() {
    let names: Vec<String> = ('a'..='z').map(|c| c.to_string()).collect();
    let ty = Type::Flags(Arc::new(cm_marshal::descriptor::FlagsType::new(names.clone())));
    assert_eq!(ty.size(), 4);
    assert_eq!(ty.alignment(), 4);
    assert_eq!(ty.flat_types().len(), 1);

    let mut flags = FlagsValue::new(names.clone().into());
    flags.set("b", true);
    flags.set("z", true);
    assert_eq!(flags.words(), &[0x0200_0002]);

    let entries: Vec<&str> = flags.entries().filter(|(_, v)| *v).map(|(n, _)| n).collect();
    assert_eq!(entries, vec!["b", "z"]);
}

#[test]
fn three_u32_params_no_indirection() {
    let f = FunctionType::new(
        "add3",
        "add3",
        vec![Param::new("a", Type::U32), Param::new("b", Type::U32), Param::new("c", Type::U32)],
        Some(Type::U32),
    );
    assert_eq!(f.param_flat_count(), 3);
    assert_eq!(f.return_flat_count(), 1);

    let mut m = mem(64);
    let opts = CanonicalOptions::default();
    let result = call_wasm(&f, vec![Value::U32(1), Value::U32(2), Value::U32(3)], &mut m, &opts, |flat_params| {
        assert_eq!(flat_params.len(), 3);
        let sum: i32 = flat_params.iter().map(|v| v.as_i32().unwrap()).sum();
        Ok(vec![FlatValue::I32(sum)])
    })
    .unwrap();
    assert_eq!(result, Some(Value::U32(6)));
}

#[test]
fn twenty_u32_params_trigger_indirect_parameters() {
    let params: Vec<Param> = (0..20).map(|i| Param::new(format!("p{i}"), Type::U32)).collect();
    let f = FunctionType::new("many", "many", params, None);
    assert_eq!(f.param_flat_count(), 20);
    assert!(f.param_flat_count() > cm_marshal::consts::MAX_FLAT_PARAMS);

    let mut m = mem(256);
    let opts = CanonicalOptions::default();
    let args: Vec<Value> = (0..20).map(Value::U32).collect();
    let captured_ptr = std::cell::Cell::new(0u32);

    call_wasm(&f, args, &mut m, &opts, |flat_params| {
        assert_eq!(flat_params.len(), 1);
        let ptr = flat_params[0].as_i32().unwrap() as u32;
        assert_eq!(ptr % 4, 0);
        captured_ptr.set(ptr);
        Ok(vec![])
    })
    .unwrap();

    let ptr = captured_ptr.get();
    for i in 0..20u32 {
        assert_eq!(m.get_u32(ptr + i * 4).unwrap(), i);
    }
}

#[test]
fn result_ok_err_round_trip_through_lower_lift() {
    let ty = Type::Result(Arc::new(ResultType::new(Some(Type::U32), Some(Type::String)).unwrap()));
    let opts = CanonicalOptions::default();
    let mut m = mem(128);

    let mut sink = cm_marshal::FlatSink::new();
    let ok = Value::Result(Ok(Some(Box::new(Value::U32(5)))));
    ty.lower(&mut sink, &mut m, &ok, &opts).unwrap();
    let mut stream = sink.into_stream();
    assert_eq!(ty.lift(&m, &mut stream, &opts).unwrap(), ok);
}

#[test]
fn typed_buffer_is_wire_compatible_with_list_of_u8() {
    let list_ty = Type::list(Type::U8);
    let buf_ty = Type::Buffer(cm_marshal::descriptor::BufferElem::U8);
    let opts = CanonicalOptions::default();

    let mut m = mem(64);
    let list_value = Value::List(vec![Value::U8(9), Value::U8(8)]);
    list_ty.store(&mut m, 0, &list_value, &opts).unwrap();

    let buf_value = buf_ty.load(&m, 0, &opts).unwrap();
    assert_eq!(buf_value, Value::Buffer(TypedBuffer::U8(vec![9, 8])));
}
