//! Resources: opaque 32-bit handles, differing from each other only in kind
//! tag and the associated function table higher layers use to build
//! host/service bindings.

use crate::function::FunctionType;

/// A resource's associated functions: constructors, instance methods, and
/// static functions, keyed by their own [`FunctionType::name`].
#[derive(Debug, Clone, Default)]
pub struct ResourceType {
    name: String,
    constructors: Vec<FunctionType>,
    methods: Vec<FunctionType>,
    statics: Vec<FunctionType>,
}

impl ResourceType {
    /// Declare a resource by name, with no associated functions yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), constructors: vec![], methods: vec![], statics: vec![] }
    }

    /// The resource's declared name (also the sub-service name constructors,
    /// methods, and statics are looked up under in a host/service table).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a constructor function.
    pub fn with_constructor(mut self, f: FunctionType) -> Self {
        self.constructors.push(f);
        self
    }

    /// Attach an instance method function.
    pub fn with_method(mut self, f: FunctionType) -> Self {
        self.methods.push(f);
        self
    }

    /// Attach a static function.
    pub fn with_static(mut self, f: FunctionType) -> Self {
        self.statics.push(f);
        self
    }

    /// Declared constructors.
    pub fn constructors(&self) -> &[FunctionType] {
        &self.constructors
    }

    /// Declared instance methods.
    pub fn methods(&self) -> &[FunctionType] {
        &self.methods
    }

    /// Declared static functions.
    pub fn statics(&self) -> &[FunctionType] {
        &self.statics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Type;
    use crate::function::Param;

    #[test]
    fn resource_accumulates_associated_functions() {
        let r = ResourceType::new("counter")
            .with_constructor(FunctionType::new("new", "[constructor]counter", vec![], Some(Type::Resource(Default::default()))));
        assert_eq!(r.name(), "counter");
        assert_eq!(r.constructors().len(), 1);
        assert!(r.methods().is_empty());
    }
}
