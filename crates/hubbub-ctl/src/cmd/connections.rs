//! Live connection listing.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};
use super::status::format_secs;

#[derive(Deserialize)]
struct ConnectionsResponse {
    connections: Vec<ConnectionInfo>,
}

#[derive(Deserialize)]
struct ConnectionInfo {
    id: u64,
    addr: String,
    connected_secs: u64,
    upload: Option<UploadInfo>,
}

#[derive(Deserialize)]
struct UploadInfo {
    filename: String,
    received: usize,
    total: usize,
}

pub async fn cmd_connections(port: u16) -> Result<()> {
    let resp: ConnectionsResponse = get_json(&format!("{}/connections", base_url(port))).await?;

    if resp.connections.is_empty() {
        println!("No clients connected.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Connections ({})", resp.connections.len());
    println!("═══════════════════════════════════════");

    for c in &resp.connections {
        println!("  ┌─ conn-{}", c.id);
        println!("  │  addr     : {}", c.addr);
        match &c.upload {
            Some(u) => println!("  │  upload   : {} ({}/{} chunks)", u.filename, u.received, u.total),
            None => println!("  │  upload   : -"),
        }
        println!("  └─ online   : {}", format_secs(c.connected_secs));
    }

    Ok(())
}
