use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mandi_api::auth::{self, AppState, AppStateInner};
use mandi_api::middleware::require_auth;
use mandi_api::{crops, messages, notifications, orders};
use mandi_gateway::connection;
use mandi_gateway::dispatcher::Dispatcher;
use mandi_gateway::relay::ChatRelay;

#[derive(Clone)]
struct ServerState {
    relay: ChatRelay,
    jwt_secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mandi=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("MANDI_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("MANDI_DB_PATH").unwrap_or_else(|_| "mandi.db".into());
    let host = std::env::var("MANDI_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MANDI_PORT")
        .unwrap_or_else(|_| "9001".into())
        .parse()?;

    // Init database
    let db = Arc::new(mandi_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state: presence + relay behind both REST and the gateway
    let dispatcher = Dispatcher::new();
    let relay = ChatRelay::new(db.clone(), dispatcher);
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        relay: relay.clone(),
        jwt_secret: jwt_secret.clone(),
    });

    let state = ServerState {
        relay,
        jwt_secret: jwt_secret.clone(),
    };

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/orders", post(orders::create_order))
        .route("/orders", get(orders::list_orders))
        .route("/orders", delete(orders::clear_all_orders))
        .route("/orders/{id}", put(orders::update_order))
        .route("/orders/farmer/{farmer_id}", get(orders::list_orders_for_farmer))
        .route("/crops", post(crops::create_crop))
        .route("/crops", get(crops::list_crops))
        .route("/crops/{id}", get(crops::get_crop))
        .route("/messages", post(messages::send_message))
        .route("/messages", delete(messages::clear_messages))
        .route("/messages/{user_id}/{other_user_id}", get(messages::get_history))
        .route("/messages/read/{farmer_id}/{buyer_id}", post(messages::mark_read))
        .route("/messages/unread/{farmer_id}", get(messages::unread_counts))
        .route("/notifications", post(notifications::create_notification))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/{id}/read", put(notifications::mark_notification_read))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Mandi server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<ServerState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.relay, state.jwt_secret))
}
