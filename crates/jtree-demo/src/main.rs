#![forbid(unsafe_code)]

fn main() {
    jtree_demo::init_logging();
    if let Err(error) = jtree_demo::run_from_env() {
        eprintln!("{error}");
        std::process::exit(error.exit_code());
    }
}
