//! The host factory: builds a guest-callable wire table that routes into a
//! native service object via [`call_service`].

use crate::descriptor::ResourceType;
use crate::error::Result;
use crate::flat::FlatValue;
use crate::function::{call_service, FunctionType};
use crate::memory::{GuestAllocator, Memory};
use crate::options::CanonicalOptions;
use crate::value::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// A native object the host binds guest calls to. Resource functions are
/// looked up with a `"{resource_name}.{function_name}"` qualified name.
pub trait NativeService: Send + Sync {
    /// Invoke the named native function with its already-lifted arguments.
    fn invoke(&self, qualified_name: &str, args: Vec<Value>) -> Result<Value>;
}

/// One wire-callable binding: a flat parameter sequence in, a flat result
/// sequence out.
pub type WireFn<A> = Arc<dyn Fn(&[FlatValue], &mut Memory<A>, &CanonicalOptions) -> Result<Vec<FlatValue>> + Send + Sync>;

/// Builds the wire table consumed by a guest instance's imports.
pub struct Host<A> {
    _marker: PhantomData<A>,
}

impl<A: GuestAllocator + 'static> Host<A> {
    /// Produce a table, keyed by wire name, of guest-callable bindings for
    /// every declared function and every resource's constructors, methods,
    /// and statics.
    pub fn create(
        functions: &[FunctionType],
        resources: &[ResourceType],
        service: Arc<dyn NativeService>,
    ) -> HashMap<String, WireFn<A>> {
        let mut table = HashMap::new();
        for f in functions {
            bind(&mut table, f.clone(), f.name().to_string(), service.clone());
        }
        for resource in resources {
            for f in resource
                .constructors()
                .iter()
                .chain(resource.methods())
                .chain(resource.statics())
            {
                let qualified_name = format!("{}.{}", resource.name(), f.name());
                bind(&mut table, f.clone(), qualified_name, service.clone());
            }
        }
        table
    }
}

fn bind<A: GuestAllocator + 'static>(
    table: &mut HashMap<String, WireFn<A>>,
    f: FunctionType,
    qualified_name: String,
    service: Arc<dyn NativeService>,
) {
    let wire_name = f.wire_name().to_string();
    table.insert(
        wire_name,
        Arc::new(move |flat_params: &[FlatValue], mem: &mut Memory<A>, opts: &CanonicalOptions| {
            call_service(&f, flat_params, mem, opts, |args| service.invoke(&qualified_name, args))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Type;
    use crate::function::Param;
    use crate::memory::BumpAllocator;

    struct Adder;
    impl NativeService for Adder {
        fn invoke(&self, qualified_name: &str, args: Vec<Value>) -> Result<Value> {
            assert_eq!(qualified_name, "add");
            let (Value::U32(a), Value::U32(b)) = (&args[0], &args[1]) else {
                unreachable!()
            };
            Ok(Value::U32(a + b))
        }
    }

    #[test]
    fn host_binds_functions_by_wire_name() {
        let f = FunctionType::new(
            "add",
            "host-add",
            vec![Param::new("a", Type::U32), Param::new("b", Type::U32)],
            Some(Type::U32),
        );
        let table: HashMap<String, WireFn<BumpAllocator>> = Host::create(&[f], &[], Arc::new(Adder));
        let binding = table.get("host-add").unwrap();
        let mut mem = Memory::new(vec![0; 64], BumpAllocator::default());
        let result = binding(
            &[FlatValue::I32(2), FlatValue::I32(3)],
            &mut mem,
            &CanonicalOptions::default(),
        )
        .unwrap();
        assert_eq!(result, vec![FlatValue::I32(5)]);
    }
}
