//! hubbub-ctl — command-line interface for the hubbub relay.

use anyhow::{Context, Result};

mod cmd;

const DEFAULT_PORT: u16 = 5000;

fn print_usage() {
    println!("Usage: hubbub-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status        Show relay status");
    println!("  connections   List connected clients and their uploads");
    println!();
    println!("Options:");
    println!("  --port <port>   Relay port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["connections"] => cmd::connections::cmd_connections(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
