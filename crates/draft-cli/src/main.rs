#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = draft_cli::run_from_env() {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}
