fn main() {
    if let Err(err) = geoscreen::cli::run() {
        geoscreen::ui::eprintln_error(&err);
        std::process::exit(geoscreen::exit::exit_code(&err));
    }
}
