//! Type-directed value marshaling between a host runtime and a
//! WebAssembly component-model guest.
//!
//! The crate is organized leaves-first: primitive numeric rules and the flat
//! ABI at the bottom (`flat`, `descriptor::primitive`), composite shapes
//! built on top (`descriptor::{record,flags,variant,list,string,buffer}`),
//! and the function-call adapters (`function`, `host`, `service`) at the
//! top, mirroring how a descriptor tree composes from its own children.

pub mod consts;
pub mod descriptor;
pub mod error;
pub mod flat;
pub mod function;
pub mod host;
pub mod memory;
pub mod options;
pub mod service;
pub mod value;

pub use descriptor::{Kind, Type};
pub use error::{MarshalError, Result};
pub use flat::{FlatSink, FlatStream, FlatType, FlatValue};
pub use function::{FunctionType, Param};
pub use host::{Host, NativeService};
pub use memory::{GuestAllocator, Memory};
pub use options::{CanonicalOptions, StringEncoding};
pub use service::{GuestExports, Service};
pub use value::{TypedBuffer, Value};
