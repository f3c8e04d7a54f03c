//! Telemetry setup

use anyhow::Result;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// * `RUST_LOG` - filter directives (default `info,<service>=debug`)
/// * `LOG_FORMAT` - `json` for production, anything else for pretty output
/// * `LOG_DIR` - when set, also write a daily rolling file `<service>.log`
///
/// Tenant processes log to stdout; the supervisor forwards and tags those
/// lines, so tenants normally run with the compact format.
pub fn init_telemetry(service: &str) -> Result<()> {
    let default_filter = format!("info,{}=debug", service.replace('-', "_"));
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&default_filter))?;

    let file_appender = match std::env::var("LOG_DIR") {
        Ok(dir) => Some(
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(service)
                .filename_suffix("log")
                .build(dir)?,
        ),
        Err(_) => None,
    };

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(true).with_thread_ids(true))
                .with(file_appender.map(|w| fmt::layer().json().with_writer(w).with_target(true)))
                .try_init()?;
        }
        "compact" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().without_time().with_target(false))
                .with(file_appender.map(|w| fmt::layer().with_writer(w).with_ansi(false)))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true).with_level(true))
                .with(file_appender.map(|w| fmt::layer().with_writer(w).with_ansi(false)))
                .try_init()?;
        }
    }

    Ok(())
}
