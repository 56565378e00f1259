use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::cache::{AppointmentCache, InMemoryAppointmentCache, RedisAppointmentCache};
use appointment_cell::identity::SupabaseIdentityDirectory;
use appointment_cell::store::SupabaseAppointmentStore;
use appointment_cell::{AppointmentCellState, SchedulingService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CareSync API server");

    let config = Arc::new(AppConfig::from_env());

    let supabase = Arc::new(SupabaseClient::new(&config));
    let store = Arc::new(SupabaseAppointmentStore::new(supabase.clone()));
    let directory = Arc::new(SupabaseIdentityDirectory::new(supabase));

    let cache: Arc<dyn AppointmentCache> = match config.redis_url.as_deref() {
        Some(url) if !url.is_empty() => match RedisAppointmentCache::new(url) {
            Ok(redis_cache) => Arc::new(redis_cache),
            Err(e) => {
                warn!("Redis cache unavailable ({}), falling back to in-process cache", e);
                Arc::new(InMemoryAppointmentCache::new())
            }
        },
        _ => {
            warn!("REDIS_URL not set, using in-process appointment cache");
            Arc::new(InMemoryAppointmentCache::new())
        }
    };

    let scheduling = Arc::new(SchedulingService::new(store, cache, directory));
    let state = AppointmentCellState::new(config.clone(), scheduling);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.expect("failed to bind listen address");
    axum::serve(listener, app)
        .await
        .expect("server error");
}
