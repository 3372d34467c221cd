use anyhow::Result;

use hubbub_core::ClientEvent;

use crate::*;

/// /api/status reflects live members and in-flight uploads.
#[tokio::test]
async fn test_status_reports_counts() -> Result<()> {
    let addr = boot_default().await?;

    let status = api_get(addr, "/status").await?;
    assert_eq!(status["connections"], 0);
    assert_eq!(status["uploads_in_progress"], 0);
    assert_eq!(status["echo_to_sender"], true);
    assert!(status["uptime_secs"].is_number(), "missing uptime_secs");

    let mut a = join(addr, 1).await?;
    let _b = join(addr, 2).await?;
    wait_for_count(&mut a, 2).await?;

    let chunk = ClientEvent::FileChunk(hubbub_core::ChunkUpload {
        filename: "big.bin".into(),
        file_type: "file".into(),
        data: "xx".into(),
        chunk: 0,
        total_chunks: 4,
    });
    send(&mut a, &chunk).await?;

    // Frames are handled asynchronously; poll until the upload shows up.
    let mut status = api_get(addr, "/status").await?;
    for _ in 0..50 {
        if status["uploads_in_progress"] == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        status = api_get(addr, "/status").await?;
    }
    assert_eq!(status["connections"], 2);
    assert_eq!(status["uploads_in_progress"], 1);
    Ok(())
}

/// /api/connections lists each member and its upload progress.
#[tokio::test]
async fn test_connections_lists_members() -> Result<()> {
    let addr = boot_default().await?;
    let mut a = join(addr, 1).await?;

    let chunk = ClientEvent::FileChunk(hubbub_core::ChunkUpload {
        filename: "part.bin".into(),
        file_type: "file".into(),
        data: "xx".into(),
        chunk: 1,
        total_chunks: 3,
    });
    send(&mut a, &chunk).await?;

    let mut listing = api_get(addr, "/connections").await?;
    for _ in 0..50 {
        if !listing["connections"][0]["upload"].is_null() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        listing = api_get(addr, "/connections").await?;
    }

    let conns = listing["connections"].as_array().expect("connections array");
    assert_eq!(conns.len(), 1);
    assert_eq!(conns[0]["addr"], "127.0.0.1");
    assert_eq!(conns[0]["upload"]["filename"], "part.bin");
    assert_eq!(conns[0]["upload"]["received"], 1);
    assert_eq!(conns[0]["upload"]["total"], 3);
    Ok(())
}
