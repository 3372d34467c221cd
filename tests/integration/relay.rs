// ── Tests ─────────────────────────────────────────────────────────────────────

use std::time::Duration;

use anyhow::Result;
use futures::SinkExt;

use hubbub_core::config::RelayConfig;
use hubbub_core::{ChunkUpload, ClientEvent, FileUpload};

use crate::*;

fn chunk(index: i64, total: i64, data: &str) -> ClientEvent {
    ClientEvent::FileChunk(ChunkUpload {
        filename: "notes.txt".into(),
        file_type: "file".into(),
        data: data.into(),
        chunk: index,
        total_chunks: total,
    })
}

/// Counts go up on join and down on leave, and every member sees them.
#[tokio::test]
async fn test_member_counts_follow_joins_and_leaves() -> Result<()> {
    let addr = boot_default().await?;

    let mut a = join(addr, 1).await?;
    let mut b = join(addr, 2).await?;
    wait_for_count(&mut a, 2).await?;

    let mut c = join(addr, 3).await?;
    wait_for_count(&mut a, 3).await?;
    wait_for_count(&mut b, 3).await?;

    c.close(None).await?;
    drop(c);
    wait_for_count(&mut a, 2).await?;
    wait_for_count(&mut b, 2).await?;
    Ok(())
}

/// Text reaches everyone, the sender included, labelled with the peer address.
#[tokio::test]
async fn test_text_is_broadcast_with_echo() -> Result<()> {
    let addr = boot_default().await?;
    let mut a = join(addr, 1).await?;
    let mut b = join(addr, 2).await?;

    send(&mut a, &ClientEvent::Message("hello".into())).await?;

    for ws in [&mut a, &mut b] {
        let msg = next_message(ws).await?;
        assert_eq!(msg.message.as_deref(), Some("hello"));
        assert_eq!(msg.kind, "text");
        assert_eq!(msg.user, "127.0.0.1");
        assert_eq!(msg.time.len(), 8, "time should be HH:MM:SS: {}", msg.time);
    }
    Ok(())
}

#[tokio::test]
async fn test_echo_disabled_skips_sender() -> Result<()> {
    let relay = RelayConfig {
        echo_to_sender: false,
        ..RelayConfig::default()
    };
    let addr = boot(relay).await?;
    let mut a = join(addr, 1).await?;
    let mut b = join(addr, 2).await?;

    send(&mut a, &ClientEvent::Message("quiet".into())).await?;

    let msg = next_message(&mut b).await?;
    assert_eq!(msg.message.as_deref(), Some("quiet"));
    assert_no_message(&mut a, Duration::from_millis(300)).await?;
    Ok(())
}

#[tokio::test]
async fn test_whole_file_is_rebroadcast() -> Result<()> {
    let addr = boot_default().await?;
    let mut a = join(addr, 1).await?;
    let mut b = join(addr, 2).await?;

    let upload = ClientEvent::File(FileUpload {
        filename: "cat.png".into(),
        data: "data:image/png;base64,AAAA".into(),
        file_type: "image".into(),
    });
    send(&mut a, &upload).await?;

    let msg = next_message(&mut b).await?;
    assert_eq!(msg.filename.as_deref(), Some("cat.png"));
    assert_eq!(msg.data.as_deref(), Some("data:image/png;base64,AAAA"));
    assert_eq!(msg.kind, "image");
    assert!(msg.message.is_none());
    Ok(())
}

/// Chunks arriving as 1, 0, 2 still produce exactly one file in index order.
#[tokio::test]
async fn test_out_of_order_chunks_reassemble() -> Result<()> {
    let addr = boot_default().await?;
    let mut a = join(addr, 1).await?;
    let mut b = join(addr, 2).await?;

    send(&mut a, &chunk(1, 3, "cd")).await?;
    send(&mut a, &chunk(0, 3, "ab")).await?;
    send(&mut a, &chunk(2, 3, "ef")).await?;

    let msg = next_message(&mut b).await?;
    assert_eq!(msg.filename.as_deref(), Some("notes.txt"));
    assert_eq!(msg.data.as_deref(), Some("abcdef"));
    assert_no_message(&mut b, Duration::from_millis(300)).await?;
    Ok(())
}

/// A client leaving halfway through an upload leaves nothing behind.
#[tokio::test]
async fn test_disconnect_mid_upload_discards_partial() -> Result<()> {
    let addr = boot_default().await?;
    let mut a = join(addr, 1).await?;
    let mut b = join(addr, 2).await?;

    send(&mut a, &chunk(0, 2, "ab")).await?;
    a.close(None).await?;
    drop(a);

    wait_for_count(&mut b, 1).await?;
    assert_no_message(&mut b, Duration::from_millis(300)).await?;

    let status = api_get(addr, "/status").await?;
    assert_eq!(status["uploads_in_progress"], 0);
    Ok(())
}

/// Garbage frames and bad chunk headers are dropped; the connection stays usable.
#[tokio::test]
async fn test_malformed_frames_are_ignored() -> Result<()> {
    let addr = boot_default().await?;
    let mut a = join(addr, 1).await?;

    send_raw(&mut a, "not valid json").await?;
    send_raw(&mut a, r#"{"event":"dance","data":1}"#).await?;
    send(&mut a, &chunk(0, 0, "ab")).await?;
    send(&mut a, &chunk(5, 2, "ab")).await?;

    send(&mut a, &ClientEvent::Message("still here".into())).await?;
    let msg = next_message(&mut a).await?;
    assert_eq!(msg.message.as_deref(), Some("still here"));
    Ok(())
}

/// An absurd totalChunks is refused; the client stays usable and leaves cleanly.
#[tokio::test]
async fn test_huge_chunk_total_is_rejected() -> Result<()> {
    let addr = boot_default().await?;
    let mut a = join(addr, 1).await?;

    send(&mut a, &chunk(0, i64::MAX, "x")).await?;
    send(&mut a, &ClientEvent::Message("after".into())).await?;
    let msg = next_message(&mut a).await?;
    assert_eq!(msg.message.as_deref(), Some("after"));

    let status = api_get(addr, "/status").await?;
    assert_eq!(status["uploads_in_progress"], 0);

    a.close(None).await?;
    drop(a);

    let mut status = api_get(addr, "/status").await?;
    for _ in 0..50 {
        if status["connections"] == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        status = api_get(addr, "/status").await?;
    }
    assert_eq!(status["connections"], 0, "registry entry left behind");
    Ok(())
}

/// Upgrades beyond the configured cap are refused.
#[tokio::test]
async fn test_connection_cap_refuses_extra_clients() -> Result<()> {
    let relay = RelayConfig {
        max_connections: 1,
        ..RelayConfig::default()
    };
    let addr = boot(relay).await?;
    let mut a = join(addr, 1).await?;

    assert!(connect(addr).await.is_err(), "second client should be refused");

    a.close(None).await?;
    drop(a);

    // The slot frees up once the first client is gone.
    let mut retried = None;
    for _ in 0..50 {
        if let Ok(ws) = connect(addr).await {
            retried = Some(ws);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let mut b = retried.expect("slot should free after disconnect");
    wait_for_count(&mut b, 1).await?;
    Ok(())
}
