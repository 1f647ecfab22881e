use std::process;

use okms_cli::okms_main;

#[tokio::main]
async fn main() {
    if let Err(err) = okms_main().await {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
