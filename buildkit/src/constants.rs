/// Extension of shader sources accepted by the compiler.
pub const SHADER_SOURCE_EXTENSION: &str = "slang";
/// Extension of the compiled artifact written next to each source.
pub const SHADER_BINARY_EXTENSION: &str = "spv";

/// Shader compiler executable, looked up on `PATH`.
pub const COMPILER: &str = "slangc";
/// Environment variable that overrides [`COMPILER`].
pub const COMPILER_ENV: &str = "SLANGC";
pub const OUTPUT_FLAG: &str = "-o";

/// Resource locations staged into the build tree, in copy order.
///
/// Plain entries are directories copied whole. An entry containing `*` is
/// `directory/pattern` and only copies the matching files.
pub const RESOURCES: &[&str] = &["Assets", "Configs", "Scripts", "Shaders/*.spv"];
