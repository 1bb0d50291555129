mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use weather_store::{SystemClock, SystemConfigLoader};

use crate::handlers::*;
use crate::state::{create_default_config, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "weather.toml")]
    config: PathBuf,
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let user_routes = Router::new()
        .route("/", post(create_user))
        .route("/:id", delete(delete_user))
        .route("/by-last-access", delete(delete_users_by_last_access))
        .route("/role-by-creation", put(update_roles_by_creation));

    let weather_routes = Router::new()
        .route("/", get(list_readings).post(create_reading))
        .route("/batch", post(create_readings))
        .route("/batch-precipitation", patch(batch_insert_precipitation))
        .route("/by-time", delete(delete_readings_by_time))
        .route("/device-name", put(rename_device))
        .route("/search", get(search_readings))
        .route("/max-precipitation", get(max_precipitation))
        .route("/max-temperature", get(max_temperature))
        .route("/reading", get(find_reading))
        .route("/newest-per-temperature", get(newest_per_temperature))
        .route(
            "/:id",
            get(get_reading).put(update_reading).delete(delete_reading),
        )
        .route("/:id/precipitation", put(update_precipitation));

    Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/weather", weather_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !args.config.exists() {
        warn!(path = %args.config.display(), "config file missing, creating default config");
        create_default_config(&args.config)?;
    }

    let (_, config) = SystemConfigLoader::from_path(&args.config)?;
    let state = Arc::new(AppState::from_config(&config, SystemClock::shared())?);
    let app = build_router(state);

    info!("weather-server listening on {}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
