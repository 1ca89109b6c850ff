use std::process::ExitCode;

fn main() -> ExitCode {
    ratecard_cli::run()
}
