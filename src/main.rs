fn main() {
    if let Err(err) = android_emulator_mcp_lib::run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
