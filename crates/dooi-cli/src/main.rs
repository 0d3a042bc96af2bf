use std::process::ExitCode;

fn main() -> ExitCode {
    dooi_cli::run()
}
