use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use log::*;
use thiserror::Error;

use crate::constants;
use crate::pattern;

/// Why a single shader did not compile. Failures are per file and never stop
/// the rest of a batch.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("File must have .{} extension: {}", constants::SHADER_SOURCE_EXTENSION, .0.display())]
    WrongExtension(PathBuf),
    #[error("Failed to launch `{}`: {source}", .compiler.display())]
    Launch {
        compiler: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Error compiling {name} ({status})")]
    Failed { name: String, status: ExitStatus },
}

/// A shader source file that exists and carries the source extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    path: PathBuf,
}

impl ShaderSource {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, CompileError> {
        let path = path.into();

        if !path.is_file() {
            return Err(CompileError::NotFound(path));
        }

        let extension = path.extension().and_then(|e| e.to_str());
        if extension != Some(constants::SHADER_SOURCE_EXTENSION) {
            return Err(CompileError::WrongExtension(path));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the source, `.` for a bare file name.
    pub fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Where the compiled binary goes: same directory and base name, binary
    /// extension. Overwritten on every run.
    pub fn artifact_path(&self) -> PathBuf {
        self.dir().join(format!(
            "{}.{}",
            self.stem(),
            constants::SHADER_BINARY_EXTENSION
        ))
    }
}

/// Outcome of a batch.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Paths left after pattern expansion, valid or not.
    pub candidates: usize,
    /// Artifacts written, in order.
    pub compiled: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, CompileError)>,
}

impl CompileReport {
    /// An empty batch succeeds. Otherwise every candidate must have compiled.
    pub fn is_success(&self) -> bool {
        self.candidates == 0 || (self.failed.is_empty() && !self.compiled.is_empty())
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Runs the external shader compiler over files resolved from glob patterns.
#[derive(Clone, Debug)]
pub struct ShaderCompiler {
    compiler: PathBuf,
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        Self::new(constants::COMPILER)
    }
}

impl ShaderCompiler {
    pub fn new(compiler: impl Into<PathBuf>) -> Self {
        Self {
            compiler: compiler.into(),
        }
    }

    /// Uses the compiler named by `SLANGC`, falling back to `slangc` on `PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os(constants::COMPILER_ENV) {
            Some(compiler) if !compiler.is_empty() => Self::new(compiler),
            _ => Self::default(),
        }
    }

    pub fn compiler(&self) -> &Path {
        &self.compiler
    }

    /// Expands each pattern in order. A pattern with no matches is kept as a
    /// literal path so a missing file surfaces as an error later.
    pub fn resolve<S: AsRef<Path>>(&self, patterns: &[S]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let matches = pattern::expand(pattern);
            if matches.is_empty() {
                debug!(
                    "`{}` matched nothing, using it as a file name.",
                    pattern.display()
                );
                files.push(pattern.to_path_buf());
            } else {
                files.extend(matches);
            }
        }
        files
    }

    /// Validates and compiles one file, returning the artifact written.
    pub fn compile_one(&self, path: &Path) -> Result<PathBuf, CompileError> {
        let source = ShaderSource::new(path)?;
        let output = source.artifact_path();

        let args: [OsString; 3] = [
            source.path().into(),
            constants::OUTPUT_FLAG.into(),
            output.clone().into(),
        ];
        info!(
            "Compiling: {} {}",
            self.compiler.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let status = Command::new(&self.compiler)
            .args(&args)
            .status()
            .map_err(|source| CompileError::Launch {
                compiler: self.compiler.clone(),
                source,
            })?;

        if !status.success() {
            return Err(CompileError::Failed {
                name: source.file_name(),
                status,
            });
        }

        Ok(output)
    }

    /// Compiles every file the patterns resolve to, one after another. A
    /// failing file is reported and the batch moves on.
    pub fn compile<S: AsRef<Path>>(&self, patterns: &[S]) -> CompileReport {
        let files = self.resolve(patterns);
        let mut report = CompileReport {
            candidates: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            warn!("No shader files found matching the patterns.");
            return report;
        }

        for file in files {
            match self.compile_one(&file) {
                Ok(output) => report.compiled.push(output),
                Err(err) => {
                    error!("{}", err);
                    report.failed.push((file, err));
                }
            }
        }

        if report.is_success() {
            info!(
                "Successfully compiled {} shader(s)!",
                report.compiled.len()
            );
        } else {
            debug!(
                "{} of {} shader(s) failed.",
                report.failed.len(),
                report.candidates
            );
        }

        report
    }
}

/// Help text for the `compile_shaders` binary.
pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <pattern> [pattern2 ...]\n\
         Examples:\n  \
         {program} Shaders/**/*.slang\n  \
         {program} Shaders/Deferred/*.slang\n  \
         {program} Shaders/Forward/pbr.slang Shaders/Deferred/*.slang"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[cfg(unix)]
    fn stub_compiler(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("stub-slangc");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Writes its output file and exits 0, or exits 1 for sources named `bad*`.
    #[cfg(unix)]
    const WRITES_OUTPUT: &str = "case \"$(basename \"$1\")\" in\n  bad*) exit 1 ;;\nesac\n\
                                 [ \"$2\" = \"-o\" ] || exit 2\nprintf compiled > \"$3\"";

    fn source(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"[shader(\"vertex\")] void main() {}").unwrap();
        path
    }

    fn arg(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_artifact_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = source(dir.path(), "pbr.slang");

        let shader = ShaderSource::new(&path).unwrap();
        assert_eq!(shader.stem(), "pbr");
        assert_eq!(shader.artifact_path(), dir.path().join("pbr.spv"));
    }

    #[test]
    fn test_bare_file_name_uses_current_dir() {
        let shader = ShaderSource {
            path: PathBuf::from("pbr.slang"),
        };
        assert_eq!(shader.dir(), Path::new("."));
        assert_eq!(shader.artifact_path(), Path::new("./pbr.spv"));
    }

    #[test]
    fn test_validation() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.slang");
        let glsl = source(dir.path(), "shader.frag");
        fs::create_dir(dir.path().join("folder.slang")).unwrap();

        assert!(matches!(
            ShaderSource::new(&missing),
            Err(CompileError::NotFound(_))
        ));
        assert!(matches!(
            ShaderSource::new(&glsl),
            Err(CompileError::WrongExtension(_))
        ));
        assert!(matches!(
            ShaderSource::new(dir.path().join("folder.slang")),
            Err(CompileError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_keeps_unmatched_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(dir.path(), "a.slang");
        let b = source(dir.path(), "b.slang");
        let glob = format!("{}/*.slang", dir.path().display());
        let missing = format!("{}/nothing/*.slang", dir.path().display());

        let files = ShaderCompiler::default().resolve(&[glob, missing.clone()]);
        assert_eq!(files, vec![a, b, PathBuf::from(missing)]);
    }

    #[test]
    fn test_empty_batch_succeeds() {
        let report = ShaderCompiler::new("/nonexistent/slangc").compile::<&str>(&[]);
        assert_eq!(report.candidates, 0);
        assert!(report.compiled.is_empty());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_missing_compiler_is_a_file_failure() {
        let dir = tempfile::tempdir().unwrap();
        let a = source(dir.path(), "a.slang");

        let report = ShaderCompiler::new(dir.path().join("no-such-compiler")).compile(&[arg(&a)]);
        assert_eq!(report.exit_code(), 1);
        assert!(matches!(report.failed[0].1, CompileError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_compiles_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = ShaderCompiler::new(stub_compiler(dir.path(), WRITES_OUTPUT));
        let a = source(dir.path(), "a.slang");

        let report = compiler.compile(&[arg(&a)]);
        let artifact = dir.path().join("a.spv");
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.compiled, vec![artifact.clone()]);
        assert_eq!(fs::read(artifact).unwrap(), b"compiled");
    }

    #[cfg(unix)]
    #[test]
    fn test_artifact_is_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = ShaderCompiler::new(stub_compiler(dir.path(), WRITES_OUTPUT));
        let a = source(dir.path(), "a.slang");
        fs::write(dir.path().join("a.spv"), b"old").unwrap();

        assert_eq!(compiler.compile(&[arg(&a)]).exit_code(), 0);
        assert_eq!(fs::read(dir.path().join("a.spv")).unwrap(), b"compiled");
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = ShaderCompiler::new(stub_compiler(dir.path(), WRITES_OUTPUT));
        let bad = source(dir.path(), "bad.slang");
        let good = source(dir.path(), "good.slang");

        let report = compiler.compile(&[arg(&bad), arg(&good)]);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.compiled, vec![dir.path().join("good.spv")]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            &report.failed[0].1,
            CompileError::Failed { name, .. } if name == "bad.slang"
        ));
        assert!(!dir.path().join("bad.spv").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_files_skip_the_compiler() {
        let dir = tempfile::tempdir().unwrap();
        // Leaves a marker whenever it runs.
        let marker = dir.path().join("invoked");
        let compiler = ShaderCompiler::new(stub_compiler(
            dir.path(),
            &format!("touch \"{}\"", marker.display()),
        ));
        let glsl = source(dir.path(), "shader.frag");
        let missing = dir.path().join("missing.slang");

        let report = compiler.compile(&[arg(&glsl), arg(&missing)]);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed.len(), 2);
        assert!(report.compiled.is_empty());
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_success_iff_every_invocation_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = ShaderCompiler::new(stub_compiler(dir.path(), WRITES_OUTPUT));
        fs::create_dir(dir.path().join("Shaders")).unwrap();
        let shaders = dir.path().join("Shaders");
        source(&shaders, "gbuffer.slang");
        source(&shaders, "lighting.slang");
        let glob = format!("{}/**/*.slang", shaders.display());

        assert_eq!(compiler.compile(&[glob.clone()]).exit_code(), 0);

        source(&shaders, "bad_tonemap.slang");
        let report = compiler.compile(&[glob]);
        assert_eq!(report.candidates, 3);
        assert_eq!(report.compiled.len(), 2);
        assert_eq!(report.exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unmatched_pattern_fails_but_batch_compiles() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = ShaderCompiler::new(stub_compiler(dir.path(), WRITES_OUTPUT));
        let a = source(dir.path(), "a.slang");
        let nothing = format!("{}/nothing/*.slang", dir.path().display());

        let report = compiler.compile(&[nothing.clone(), arg(&a)]);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.compiled, vec![dir.path().join("a.spv")]);
        assert_eq!(fs::read(dir.path().join("a.spv")).unwrap(), b"compiled");
        assert!(matches!(
            &report.failed[..],
            [(path, CompileError::NotFound(_))] if *path == PathBuf::from(&nothing)
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_pattern_is_a_file_failure() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join(OsStr::from_bytes(b"missing\xff.slang"));

        let report = ShaderCompiler::new("/nonexistent/slangc").compile(&[&pattern]);
        assert_eq!(report.exit_code(), 1);
        assert!(matches!(
            &report.failed[..],
            [(path, CompileError::NotFound(_))] if *path == pattern
        ));
    }

    #[test]
    fn test_usage_lists_examples() {
        let text = usage("compile_shaders");
        assert!(text.starts_with("Usage: compile_shaders <pattern>"));
        assert!(text.contains("compile_shaders Shaders/**/*.slang"));
    }
}
