// src/main.rs

use probebench::{cli, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run(cli::parse()).await {
        eprintln!("probebench error: {err:?}");
        std::process::exit(1);
    }
}
