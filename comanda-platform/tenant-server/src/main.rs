// ============================================================================
// Comanda Tenant Server
// File: comanda-platform/tenant-server/src/main.rs
// ============================================================================
//! One restaurant's process. Launched by the control plane with its identity
//! in `TENANT_ID`, `TENANT_PORT`, `TENANT_SUBDOMAIN` and `TENANT_NAME`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use comanda_api::security::LoginThrottle;
use comanda_api::{tenant_router, TenantState};
use comanda_core::services::{AuthService, ProfileService};
use comanda_infrastructure::{create_pool, PgRestaurantRepository};
use comanda_security::JwtService;
use comanda_shared::config::AppConfig;
use comanda_shared::telemetry::init_telemetry;
use comanda_shared::TenantContext;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry("comanda-tenant-server")?;

    let tenant = TenantContext::from_env().context("Tenant identity missing from environment")?;
    let tag = tenant.log_tag();
    info!("🚀 Starting tenant server {}", tag);

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Schema is owned by the control plane; tenants never migrate.
    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    let repo = Arc::new(PgRestaurantRepository::new(pool));

    let jwt = Arc::new(JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry));
    let state = TenantState {
        auth: Arc::new(AuthService::new(repo.clone(), jwt, config.app.port, None)),
        profiles: Arc::new(ProfileService::new(repo)),
        throttle: Arc::new(LoginThrottle::per_minute(config.security.login_attempts_per_minute)),
        tenant: tenant.clone(),
    };
    let app = tenant_router(state);

    let addr = SocketAddr::from((config.app.host.parse::<IpAddr>()?, tenant.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("{} failed to bind {}", tag, addr))?;
    info!("🎯 {} listening on {}", tag, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 {} stopped", tag);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
