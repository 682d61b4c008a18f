use std::process::ExitCode;

use buildkit::{logging, usage, ShaderCompiler};
use log::*;

fn main() -> ExitCode {
    logging::init();

    let mut args = std::env::args_os();
    let program = args
        .next()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "compile_shaders".into());
    let patterns = args.collect::<Vec<_>>();

    if patterns.is_empty() {
        warn!("No shader files specified.");
        println!("{}", usage(&program));
        return ExitCode::SUCCESS;
    }

    let report = ShaderCompiler::from_env().compile(&patterns);
    ExitCode::from(report.exit_code())
}
