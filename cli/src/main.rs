//! Binary entrypoint for stubhook-cli

fn main() {
    if let Err(err) = stubhook_cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
