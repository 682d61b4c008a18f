use std::process::ExitCode;

use buildkit::{copy, logging};
use log::*;

fn main() -> ExitCode {
    logging::init();

    let args = std::env::args_os().collect::<Vec<_>>();
    let [_, source, build] = args.as_slice() else {
        println!("Usage: copy_resources <source_dir> <build_dir>");
        return ExitCode::FAILURE;
    };

    match copy(source, build) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
