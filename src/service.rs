//! The service factory: the mirror of [`crate::host`] — builds a
//! native-shaped service object whose functions route into guest exports via
//! [`call_wasm`].

use crate::descriptor::ResourceType;
use crate::error::Result;
use crate::flat::FlatValue;
use crate::function::{call_wasm, FunctionType};
use crate::memory::{GuestAllocator, Memory};
use crate::options::CanonicalOptions;
use crate::value::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// A guest instance's exported functions, addressable by wire name.
pub trait GuestExports: Send + Sync {
    /// Invoke the guest export named `wire_name` with its flat parameter
    /// sequence, returning its flat result sequence.
    fn call(&self, wire_name: &str, flat_params: Vec<FlatValue>) -> Result<Vec<FlatValue>>;
}

/// One native-callable binding: native arguments in, an optional native
/// result out.
pub type NativeFn<A> =
    Arc<dyn Fn(Vec<Value>, &mut Memory<A>, &CanonicalOptions) -> Result<Option<Value>> + Send + Sync>;

/// Builds a native-shaped call table backed by a guest instance's exports.
pub struct Service<A> {
    _marker: PhantomData<A>,
}

impl<A: GuestAllocator + 'static> Service<A> {
    /// Produce a table, keyed by native (not wire) name, of host-callable
    /// bindings for every declared function and every resource's
    /// constructors, methods, and statics.
    pub fn create(
        functions: &[FunctionType],
        resources: &[ResourceType],
        exports: Arc<dyn GuestExports>,
    ) -> HashMap<String, NativeFn<A>> {
        let mut table = HashMap::new();
        for f in functions {
            bind(&mut table, f.clone(), f.name().to_string(), exports.clone());
        }
        for resource in resources {
            for f in resource
                .constructors()
                .iter()
                .chain(resource.methods())
                .chain(resource.statics())
            {
                let qualified_name = format!("{}.{}", resource.name(), f.name());
                bind(&mut table, f.clone(), qualified_name, exports.clone());
            }
        }
        table
    }
}

fn bind<A: GuestAllocator + 'static>(
    table: &mut HashMap<String, NativeFn<A>>,
    f: FunctionType,
    native_name: String,
    exports: Arc<dyn GuestExports>,
) {
    let wire_name = f.wire_name().to_string();
    table.insert(
        native_name,
        Arc::new(move |args: Vec<Value>, mem: &mut Memory<A>, opts: &CanonicalOptions| {
            call_wasm(&f, args, mem, opts, |flat_params| exports.call(&wire_name, flat_params))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Type;
    use crate::function::Param;
    use crate::memory::BumpAllocator;

    struct EchoExports;
    impl GuestExports for EchoExports {
        fn call(&self, wire_name: &str, flat_params: Vec<FlatValue>) -> Result<Vec<FlatValue>> {
            assert_eq!(wire_name, "guest-double");
            let n = flat_params[0].as_i32()?;
            Ok(vec![FlatValue::I32(n * 2)])
        }
    }

    #[test]
    fn service_binds_functions_by_native_name() {
        let f = FunctionType::new("double", "guest-double", vec![Param::new("n", Type::U32)], Some(Type::U32));
        let table: HashMap<String, NativeFn<BumpAllocator>> = Service::create(&[f], &[], Arc::new(EchoExports));
        let binding = table.get("double").unwrap();
        let mut mem = Memory::new(vec![0; 64], BumpAllocator::default());
        let result = binding(vec![Value::U32(21)], &mut mem, &CanonicalOptions::default()).unwrap();
        assert_eq!(result, Some(Value::U32(42)));
    }
}
