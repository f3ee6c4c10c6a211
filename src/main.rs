use std::process::ExitCode;

fn main() -> ExitCode {
    potty_lib::run()
}
