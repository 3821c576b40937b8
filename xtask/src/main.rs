mod check_simd;

use anyhow::{bail, Result};
use std::env;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match run_command(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Parse and run the command from command-line arguments (pure, testable)
fn run_command(args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("Usage: cargo xtask <command>\nCommands:\n  check-simd  Validate target_feature, SAFETY and #[inline] on SIMD kernels");
    }

    let command = &args[1];

    match command.as_str() {
        "check-simd" => check_simd::run(),
        _ => bail!("Unknown command: {}", command),
    }
}
