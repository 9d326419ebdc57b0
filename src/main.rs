use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use gatehouse::config::CorsConfig;
use gatehouse::{routes, AppState, PgStore, Settings};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn cors(config: &CorsConfig) -> Cors {
    if !config.enabled {
        // CORS disabled - use most restrictive settings
        return Cors::default();
    }

    config
        .allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .supports_credentials()
        .max_age(config.max_age as usize)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("failed to load configuration")?;
    info!("Configuration loaded successfully ({})", config.environment);
    if config.uses_development_secret() {
        warn!("session.secret_key is the built-in development key; set APP_SESSION__SECRET_KEY");
    }

    let store = PgStore::new_with_options(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.acquire_timeout_secs),
    )
    .await
    .context("failed to connect to the database")?;
    store.migrate().await.context("failed to run database migrations")?;
    info!("Database ready");

    let state = web::Data::new(AppState::new(
        config.clone(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    ));

    // Expired session cleanup
    let cleanup_state = state.clone();
    let cleanup_interval = Duration::from_secs(config.session.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(cleanup_interval).await;
            match cleanup_state.auth_service.purge_expired_sessions().await {
                Ok(0) => {}
                Ok(purged) => info!("Purged {} expired sessions", purged),
                Err(e) => error!("Session cleanup failed: {}", e),
            }
        }
    });

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let server_config = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(cors(&server_config.cors))
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(|cfg| routes::configure(cfg, &server_config.routes))
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await?;

    store.close().await;
    info!("Server stopped");
    Ok(())
}
