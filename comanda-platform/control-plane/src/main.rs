// ============================================================================
// Comanda Control Plane
// File: comanda-platform/control-plane/src/main.rs
// ============================================================================
//! Platform entry point: serves the management API on the main port and
//! supervises one tenant-server process per active restaurant.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use comanda_api::security::LoginThrottle;
use comanda_api::{control_plane_router, AppState};
use comanda_core::services::{AuthService, PlatformAdmin, RestaurantService};
use comanda_core::PortRange;
use comanda_infrastructure::{create_pool, run_migrations, PgRestaurantRepository};
use comanda_security::JwtService;
use comanda_shared::config::{AdminSettings, AppConfig};
use comanda_shared::telemetry::init_telemetry;
use comanda_supervisor::{CommandLauncher, InstanceRegistry, SupervisorOptions};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry("comanda-control-plane")?;

    info!("🚀 Starting Comanda control plane...");

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    info!("✅ Configuration loaded (env={})", config.app.env);

    // Database
    let pool = create_pool(&config.database)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool).await.context("Failed to run migrations")?;
    info!("✅ Database ready, migrations applied");

    let repo = Arc::new(PgRestaurantRepository::new(pool));

    // Supervisor
    let launcher = Arc::new(CommandLauncher::new(
        config.supervisor.tenant_binary.clone(),
        config.supervisor.tenant_args.clone(),
    ));
    let registry = Arc::new(InstanceRegistry::new(
        launcher,
        SupervisorOptions::from(&config.supervisor),
    ));
    info!("✅ Supervisor ready (binary={})", config.supervisor.tenant_binary.display());

    // Services
    let jwt = Arc::new(JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry));
    let restaurants = Arc::new(RestaurantService::new(
        repo.clone(),
        registry.clone(),
        PortRange::from(config.ports),
        config.app.port,
    ));
    let auth = Arc::new(AuthService::new(
        repo.clone(),
        jwt,
        config.app.port,
        platform_admin(&config.admin)?,
    ));

    // Bring tenant processes back after a restart
    let report = registry
        .reconcile_on_startup(repo.as_ref())
        .await
        .context("Startup reconciliation failed")?;
    if !report.failed.is_empty() {
        warn!("{} restaurant(s) could not be started, see errors above", report.failed.len());
    }

    let app = control_plane_router(AppState {
        restaurants,
        auth,
        throttle: Arc::new(LoginThrottle::per_minute(config.security.login_attempts_per_minute)),
        main_port: config.app.port,
        public_host: config.app.public_host.clone(),
    });

    let addr = SocketAddr::from((config.app.host.parse::<IpAddr>()?, config.app.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 Control plane listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Stopping {} tenant instance(s)...", registry.len());
    registry.shutdown_all().await;
    info!("👋 Control plane stopped");

    Ok(())
}

fn platform_admin(settings: &AdminSettings) -> Result<Option<PlatformAdmin>> {
    match (&settings.email, &settings.password_hash) {
        (Some(email), Some(password_hash)) => Ok(Some(PlatformAdmin {
            email: email.clone(),
            password_hash: password_hash.clone(),
        })),
        (None, None) => {
            warn!("No platform admin configured; management routes are unreachable");
            Ok(None)
        }
        _ => bail!("admin.email and admin.password_hash must be set together"),
    }
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
