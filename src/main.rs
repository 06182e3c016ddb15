fn main() {
    if let Err(e) = annorecon::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
