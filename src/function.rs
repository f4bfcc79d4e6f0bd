//! Function descriptors and the host/service call adapters that bridge the
//! flat stack at a function-call boundary, including the indirect
//! parameter/return conventions.

use crate::consts::{MAX_FLAT_PARAMS, MAX_FLAT_RESULTS};
use crate::descriptor::{TupleType, Type};
use crate::error::{MarshalError, Result};
use crate::flat::{FlatSink, FlatStream, FlatValue};
use crate::memory::{GuestAllocator, Memory};
use crate::options::CanonicalOptions;
use crate::value::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// One named, typed parameter of a [`FunctionType`].
#[derive(Debug, Clone)]
pub struct Param {
    /// The parameter's declared name.
    pub name: String,
    /// The parameter's descriptor.
    pub ty: Type,
}

impl Param {
    /// Declare a parameter.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty }
    }
}

/// A function's native name, wire (ABI) name, ordered parameter list, and
/// optional return descriptor.
#[derive(Debug, Clone)]
pub struct FunctionType {
    name: String,
    wire_name: String,
    params: Vec<Param>,
    ret: Option<Type>,
}

impl FunctionType {
    /// Declare a function descriptor.
    pub fn new(name: impl Into<String>, wire_name: impl Into<String>, params: Vec<Param>, ret: Option<Type>) -> Self {
        Self { name: name.into(), wire_name: wire_name.into(), params, ret }
    }

    /// The native-side name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wire (ABI) symbol.
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    /// Declared parameters, in call order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Declared return type, if any.
    pub fn ret(&self) -> Option<&Type> {
        self.ret.as_ref()
    }

    /// Sum of every parameter's flat length.
    pub fn param_flat_count(&self) -> usize {
        self.params.iter().map(|p| p.ty.flat_types().len()).sum()
    }

    /// The return type's flat length (0 if there is none).
    pub fn return_flat_count(&self) -> usize {
        self.ret.as_ref().map(|t| t.flat_types().len()).unwrap_or(0)
    }

    fn indirect_params(&self) -> bool {
        self.param_flat_count() > MAX_FLAT_PARAMS
    }

    fn indirect_return(&self) -> bool {
        self.return_flat_count() > MAX_FLAT_RESULTS
    }

    /// A synthetic tuple type of every parameter, used to pack/unpack the
    /// indirect-parameter pointer convention.
    fn params_tuple(&self) -> Result<TupleType> {
        TupleType::new(self.params.iter().map(|p| p.ty.clone()).collect())
    }
}

/// Lift a function's flat parameter stream (or indirect parameter pointer)
/// into native values, in declared parameter order.
fn lift_params<A: GuestAllocator>(
    f: &FunctionType,
    flat_params: &[FlatValue],
    mem: &Memory<A>,
    opts: &CanonicalOptions,
) -> Result<Vec<Value>> {
    if f.indirect_params() {
        let ptr = flat_params
            .first()
            .ok_or_else(|| MarshalError::abi_violation("missing indirect parameter pointer"))?
            .as_i32()? as u32;
        let tuple = f.params_tuple()?;
        tuple
            .elems()
            .iter()
            .map(|(ty, offset)| ty.load(mem, ptr + offset, opts))
            .collect()
    } else {
        let mut stream = FlatStream::new(flat_params.iter().copied());
        f.params.iter().map(|p| p.ty.lift(mem, &mut stream, opts)).collect()
    }
}

/// Lower native arguments to a flat parameter sequence, packing them behind
/// a pointer if they exceed [`MAX_FLAT_PARAMS`].
fn lower_params<A: GuestAllocator>(
    f: &FunctionType,
    args: &[Value],
    mem: &mut Memory<A>,
    opts: &CanonicalOptions,
) -> Result<Vec<FlatValue>> {
    if f.indirect_params() {
        let tuple = f.params_tuple()?;
        let ptr = mem.alloc(tuple.alignment(), tuple.size());
        for ((ty, offset), arg) in tuple.elems().iter().zip(args) {
            ty.store(mem, ptr + offset, arg, opts)?;
        }
        Ok(vec![FlatValue::I32(ptr as i32)])
    } else {
        let mut sink = FlatSink::new();
        for (p, arg) in f.params.iter().zip(args) {
            p.ty.lower(&mut sink, mem, arg, opts)?;
        }
        Ok(sink.as_slice().to_vec())
    }
}

/// Lower a native result to its flat return sequence. In the indirect case
/// the guest, as caller, has already allocated the out-pointer and appended
/// it as the last element of `flat_params`; the host only stores through it
/// and has nothing left to communicate back on the flat stack.
fn lower_return<A: GuestAllocator>(
    f: &FunctionType,
    flat_params: &[FlatValue],
    result: &Value,
    mem: &mut Memory<A>,
    opts: &CanonicalOptions,
) -> Result<Vec<FlatValue>> {
    let Some(ret) = &f.ret else {
        return Ok(vec![]);
    };
    if f.indirect_return() {
        let ptr = flat_params
            .last()
            .ok_or_else(|| MarshalError::abi_violation("missing indirect return out-pointer"))?
            .as_i32()? as u32;
        ret.store(mem, ptr, result, opts)?;
        Ok(vec![])
    } else {
        let mut sink = FlatSink::new();
        ret.lower(&mut sink, mem, result, opts)?;
        Ok(sink.as_slice().to_vec())
    }
}

fn lift_return<A: GuestAllocator>(
    f: &FunctionType,
    flat_return: &[FlatValue],
    mem: &Memory<A>,
    opts: &CanonicalOptions,
) -> Result<Option<Value>> {
    let Some(ret) = &f.ret else {
        return Ok(None);
    };
    if f.indirect_return() {
        let ptr = flat_return
            .first()
            .ok_or_else(|| MarshalError::abi_violation("missing indirect return pointer"))?
            .as_i32()? as u32;
        Ok(Some(ret.load(mem, ptr, opts)?))
    } else {
        let mut stream = FlatStream::new(flat_return.iter().copied());
        Ok(Some(ret.lift(mem, &mut stream, opts)?))
    }
}

/// Invoke a host-side native implementation for a guest→host call: lift the
/// guest's flat parameters, call `native_impl`, lower its result back to the
/// flat/out-pointer convention the guest expects.
pub fn call_service<A, F>(
    f: &FunctionType,
    flat_params: &[FlatValue],
    mem: &mut Memory<A>,
    opts: &CanonicalOptions,
    native_impl: F,
) -> Result<Vec<FlatValue>>
where
    A: GuestAllocator,
    F: FnOnce(Vec<Value>) -> Result<Value>,
{
    let span = tracing::debug_span!("call_service", wire_name = f.wire_name());
    let _guard = span.enter();
    trace!(param_flat_count = f.param_flat_count(), return_flat_count = f.return_flat_count(), "entering");

    let outcome = (|| {
        let args = lift_params(f, flat_params, mem, opts)?;
        let result = native_impl(args)?;
        if f.ret.is_none() {
            return Ok(vec![]);
        }
        lower_return(f, flat_params, &result, mem, opts)
    })();

    if let Err(e) = &outcome {
        debug!(error = %e, wire_name = f.wire_name(), "call_service failed");
    }
    trace!("exiting");
    outcome
}

/// Invoke a guest export for a host→guest call: lower native arguments to
/// flat/out-pointer form, call `guest_fn`, lift its flat result back to
/// native.
pub fn call_wasm<A, G>(
    f: &FunctionType,
    args: Vec<Value>,
    mem: &mut Memory<A>,
    opts: &CanonicalOptions,
    guest_fn: G,
) -> Result<Option<Value>>
where
    A: GuestAllocator,
    G: FnOnce(Vec<FlatValue>) -> Result<Vec<FlatValue>>,
{
    let span = tracing::debug_span!("call_wasm", wire_name = f.wire_name());
    let _guard = span.enter();
    trace!(param_flat_count = f.param_flat_count(), return_flat_count = f.return_flat_count(), "entering");

    let outcome = (|| {
        let mut flat_params = lower_params(f, &args, mem, opts)?;
        let mut out_ptr = None;
        if f.indirect_return() {
            if let Some(ret) = &f.ret {
                let ptr = mem.alloc(ret.alignment(), ret.size());
                flat_params.push(FlatValue::I32(ptr as i32));
                out_ptr = Some(ptr);
            }
        }
        let flat_return = guest_fn(flat_params)?;
        if let Some(ptr) = out_ptr {
            let ret = f.ret.as_ref().unwrap();
            return Ok(Some(ret.load(mem, ptr, opts)?));
        }
        lift_return(f, &flat_return, mem, opts)
    })();

    if let Err(e) = &outcome {
        debug!(error = %e, wire_name = f.wire_name(), "call_wasm failed");
    }
    trace!("exiting");
    outcome
}

/// A bundle of a native service object's callable functions, keyed by wire
/// name, produced by the host factory.
pub type WireTable<F> = std::collections::HashMap<String, Arc<F>>;
