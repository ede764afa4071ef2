//! The `amorph` CLI binary: parses arguments and dispatches into the library.

fn main() {
    std::process::exit(amorph::cli::run());
}
