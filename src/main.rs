fn main() {
    if let Err(err) = csv_assert::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
