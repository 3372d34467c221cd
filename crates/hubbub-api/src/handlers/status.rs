//! /status and /connections handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub connections: usize,
    pub uploads_in_progress: usize,
    pub echo_to_sender: bool,
    pub uptime_secs: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let controller = &state.controller;
    Json(StatusResponse {
        connections: controller.registry().size(),
        uploads_in_progress: controller.reassembler().in_progress(),
        echo_to_sender: controller.echo_to_sender(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

// ── /connections ─────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
pub struct ConnectionsResponse {
    pub connections: Vec<ConnectionJson>,
}

#[derive(Serialize, Deserialize)]
pub struct ConnectionJson {
    pub id: u64,
    pub addr: String,
    pub connected_secs: u64,
    pub upload: Option<UploadJson>,
}

#[derive(Serialize, Deserialize)]
pub struct UploadJson {
    pub filename: String,
    pub received: usize,
    pub total: usize,
}

pub async fn handle_connections(State(state): State<ApiState>) -> Json<ConnectionsResponse> {
    let reassembler = state.controller.reassembler();
    let connections = state
        .controller
        .registry()
        .list()
        .into_iter()
        .map(|c| ConnectionJson {
            id: c.id.0,
            addr: c.addr,
            connected_secs: c.connected_at.elapsed().as_secs(),
            upload: reassembler.progress(c.id).map(|p| UploadJson {
                filename: p.filename,
                received: p.received,
                total: p.total,
            }),
        })
        .collect();

    Json(ConnectionsResponse { connections })
}
