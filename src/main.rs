//! krylay command-line interface

use krylay::cli::LayoutCli;
use std::process;

fn main() {
    let mut cli = LayoutCli::new();
    if let Err(e) = cli.run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
