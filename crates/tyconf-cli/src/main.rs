use std::process::ExitCode;

fn main() -> ExitCode {
    tyconf_cli::run()
}
