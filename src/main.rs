fn main() {
    if let Err(e) = infobook_agent_lib::run() {
        eprintln!("infobook-agent: {e}");
        std::process::exit(1);
    }
}
