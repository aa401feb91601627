fn main() {
    if let Err(e) = mobile_chat_exporter::cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
