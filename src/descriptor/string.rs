//! `wstring`: a `(data_ptr, code_units)` pair in linear memory, a matching
//! `[i32, i32]` flat pair, and a codec selected by [`CanonicalOptions`].

use crate::error::{MarshalError, Result};
use crate::flat::{FlatStream, FlatValue};
use crate::memory::{GuestAllocator, Memory};
use crate::options::{CanonicalOptions, StringEncoding};
use crate::value::Value;

fn decode(bytes: &[u8], encoding: StringEncoding) -> Result<String> {
    match encoding {
        StringEncoding::Utf8 => {
            std::str::from_utf8(bytes).map(str::to_owned).map_err(|e| MarshalError::abi_violation(e.to_string()))
        }
        StringEncoding::Utf16 => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|e| MarshalError::abi_violation(e.to_string()))
        }
        StringEncoding::Latin1Utf16 => unreachable!("checked by require_implemented_encoding"),
    }
}

fn encode(s: &str, encoding: StringEncoding) -> Vec<u8> {
    match encoding {
        StringEncoding::Utf8 => s.as_bytes().to_vec(),
        StringEncoding::Utf16 => s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        StringEncoding::Latin1Utf16 => unreachable!("checked by require_implemented_encoding"),
    }
}

fn code_units(byte_len: usize, encoding: StringEncoding) -> u32 {
    match encoding {
        StringEncoding::Utf8 => byte_len as u32,
        StringEncoding::Utf16 | StringEncoding::Latin1Utf16 => (byte_len / 2) as u32,
    }
}

pub(super) fn load<A: GuestAllocator>(mem: &Memory<A>, ptr: u32, opts: &CanonicalOptions) -> Result<Value> {
    opts.require_implemented_encoding()?;
    let data_ptr = mem.get_u32(ptr)?;
    let units = mem.get_u32(ptr + 4)?;
    let byte_len = match opts.encoding {
        StringEncoding::Utf8 => units as usize,
        _ => units as usize * 2,
    };
    let bytes = mem.read_bytes(data_ptr, byte_len)?;
    Ok(Value::String(decode(bytes, opts.encoding)?))
}

pub(super) fn store<A: GuestAllocator>(
    mem: &mut Memory<A>,
    ptr: u32,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    opts.require_implemented_encoding()?;
    let Value::String(s) = value else {
        return Err(MarshalError::abi_violation("expected a string value"));
    };
    let bytes = encode(s, opts.encoding);
    let data_ptr = mem.alloc(opts.encoding.body_alignment(), bytes.len() as u32);
    mem.write_bytes(data_ptr, &bytes)?;
    mem.set_u32(ptr, data_ptr)?;
    mem.set_u32(ptr + 4, code_units(bytes.len(), opts.encoding))
}

pub(super) fn lift<A: GuestAllocator>(
    mem: &Memory<A>,
    stream: &mut FlatStream,
    opts: &CanonicalOptions,
) -> Result<Value> {
    opts.require_implemented_encoding()?;
    let data_ptr = stream.next()?.as_i32()? as u32;
    let units = stream.next()?.as_i32()? as u32;
    let byte_len = match opts.encoding {
        StringEncoding::Utf8 => units as usize,
        _ => units as usize * 2,
    };
    let bytes = mem.read_bytes(data_ptr, byte_len)?;
    Ok(Value::String(decode(bytes, opts.encoding)?))
}

pub(super) fn lower<A: GuestAllocator>(
    sink: &mut crate::flat::FlatSink,
    mem: &mut Memory<A>,
    value: &Value,
    opts: &CanonicalOptions,
) -> Result<()> {
    opts.require_implemented_encoding()?;
    let Value::String(s) = value else {
        return Err(MarshalError::abi_violation("expected a string value"));
    };
    let bytes = encode(s, opts.encoding);
    let data_ptr = mem.alloc(opts.encoding.body_alignment(), bytes.len() as u32);
    mem.write_bytes(data_ptr, &bytes)?;
    sink.push(FlatValue::I32(data_ptr as i32));
    sink.push(FlatValue::I32(code_units(bytes.len(), opts.encoding) as i32));
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
    fn utf8_store_load_round_trip() {
        let ty = Type::String;
        let mut m = mem();
        let opts = CanonicalOptions::default();
        ty.store(&mut m, 0, &Value::String("héllo".into()), &opts).unwrap();
        assert_eq!(ty.load(&m, 0, &opts).unwrap(), Value::String("héllo".into()));
    }

    #[test]
    fn utf16_lower_lift_round_trip() {
        let ty = Type::String;
        let opts = CanonicalOptions::with_encoding(StringEncoding::Utf16);
        let mut m = mem();
        let mut sink = crate::flat::FlatSink::new();
        ty.lower(&mut sink, &mut m, &Value::String("héllo".into()), &opts).unwrap();
        let mut stream = sink.into_stream();
        assert_eq!(
            ty.lift(&m, &mut stream, &opts).unwrap(),
            Value::String("héllo".into())
        );
    }

    #[test]
    fn latin1_utf16_unsupported() {
        let ty = Type::String;
        let opts = CanonicalOptions::with_encoding(StringEncoding::Latin1Utf16);
        let m = mem();
        assert!(ty.load(&m, 0, &opts).is_err());
    }
}
