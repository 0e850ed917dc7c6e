use std::net::SocketAddr;

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use boxoffice_server::config::Config;
use boxoffice_server::handlers::AppState;
use boxoffice_server::repository::{BookingRepository, EventRepository};
use boxoffice_server::routes::create_routes;
use boxoffice_server::{db, reaper};

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.app.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting ticket reservation service");

    let pool = db::connect(&config.database)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let events = EventRepository::new(pool.clone(), config.app.seat_hold_ttl);
    let bookings = BookingRepository::new(pool.clone(), &config.app);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = tokio::spawn(reaper::run(
        events.clone(),
        config.app.sweep_interval,
        shutdown_rx,
    ));

    let state = AppState {
        pool: pool.clone(),
        events,
        bookings,
    };
    let app = create_routes(state, config.server.request_timeout);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    tracing::info!("Shutting down server...");

    let _ = shutdown_tx.send(true);
    let _ = reaper_handle.await;
    pool.close().await;

    tracing::info!("Server exited");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
