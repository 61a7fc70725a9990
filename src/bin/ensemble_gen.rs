fn main() {
    if let Err(err) = ensemble_gen::cli::run_cli() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
