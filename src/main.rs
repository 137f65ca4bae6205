use std::process::ExitCode;

fn main() -> ExitCode {
    match remd_free_energy::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
