//! Provides the main entry point to the program.
use human_panic::setup_panic;
use lecsim::cli::run_cli;
use lecsim::log::is_logger_initialised;

fn main() {
    setup_panic!();

    if let Err(err) = run_cli() {
        if is_logger_initialised() {
            ::log::error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        std::process::exit(1);
    }
}
