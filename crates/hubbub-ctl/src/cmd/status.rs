//! Relay status command.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct StatusResponse {
    connections: usize,
    uploads_in_progress: usize,
    echo_to_sender: bool,
    uptime_secs: u64,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  hubbub Relay Status");
    println!("═══════════════════════════════════════");
    println!("  Connections      : {}", resp.connections);
    println!("  Uploads in flight: {}", resp.uploads_in_progress);
    println!("  Echo to sender   : {}", if resp.echo_to_sender { "yes" } else { "no" });
    println!("  Uptime           : {}", format_secs(resp.uptime_secs));

    Ok(())
}

pub fn format_secs(secs: u64) -> String {
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}
