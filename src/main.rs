fn main() {
    if let Err(e) = cardchat::cli::main() {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
