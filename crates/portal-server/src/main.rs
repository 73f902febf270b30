use std::net::SocketAddr;
use std::path::PathBuf;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use portal_api::session::issue_token;
use portal_api::{AppStateInner, router};
use portal_db::Database;

/// Secrets that only exist so a fresh checkout boots.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

struct Config {
    jwt_secret: String,
    db_path: PathBuf,
    host: String,
    port: u16,
    dev_users: Vec<String>,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let jwt_secret =
            std::env::var("PORTAL_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        let db_path = std::env::var("PORTAL_DB_PATH")
            .unwrap_or_else(|_| "portal.db".into())
            .into();
        let host = std::env::var("PORTAL_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PORTAL_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()?;
        let dev_users = std::env::var("PORTAL_DEV_USERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            dev_users,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal=debug,portal_api=debug,portal_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if PLACEHOLDER_SECRETS.contains(&config.jwt_secret.as_str()) {
        warn!("PORTAL_JWT_SECRET is a placeholder; session tokens are forgeable");
    }

    let db = Database::open(&config.db_path)?;
    seed_dev_users(&db, &config)?;

    let state = AppStateInner::new(db, config.jwt_secret.clone());

    let app = router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Portal messaging server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Development convenience: make sure each named user exists and log a
/// session token for it, since login lives outside this server.
fn seed_dev_users(db: &Database, config: &Config) -> anyhow::Result<()> {
    for name in &config.dev_users {
        let id = match db.get_user_by_username(name)? {
            Some(user) => user.id,
            None => db.create_user(name)?,
        };
        let token = issue_token(&config.jwt_secret, id, name)?;
        info!("Dev user {} (id {}): token {}", name, id, token);
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
