pub mod constants;
pub mod logging;
pub mod pattern;
pub mod resource;
pub mod shader;

pub use resource::{copy, ResourceCopier, ResourceEntry};
pub use shader::{usage, CompileError, CompileReport, ShaderCompiler, ShaderSource};
