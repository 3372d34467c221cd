pub mod handlers;

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Root page, realtime endpoint and the JSON status API.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/status", get(handlers::handle_status))
        .route("/connections", get(handlers::handle_connections));

    Router::new()
        .route("/", get(handlers::handle_index))
        .route("/static/{*path}", get(handlers::handle_asset))
        .route("/ws", get(handlers::handle_ws))
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(state)
}

/// Serve on an already-bound listener until the task is dropped.
pub async fn serve_on(listener: TcpListener, state: ApiState) -> anyhow::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;
    Ok(())
}
