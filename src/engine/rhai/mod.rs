//! Sandboxed Rhai engine for functions installed at runtime.

pub mod compiler;
pub mod registry;

pub use compiler::{RhaiCompiler, RhaiCompilerError};
pub use registry::{FunctionRegistry, FunctionRegistryError};
