//! Registrar entry-point: loads settings, applies migrations and serves the
//! admin API.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

mod server;

use std::io;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use registrar::inbound::http::health::HealthState;
use registrar::outbound::persistence::{DbPool, PoolConfig, apply_migrations};
use registrar::settings::RegistrarSettings;
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = RegistrarSettings::load_from_iter(std::env::args_os())
        .map_err(|err| io::Error::other(format!("load settings: {err}")))?;
    let config = server_config(&settings).await?;

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config)?;
    server.await
}

async fn server_config(settings: &RegistrarSettings) -> io::Result<ServerConfig> {
    let invalid = |err: registrar::settings::SettingsError| io::Error::other(err.to_string());
    let config = ServerConfig::new(settings.bind_addr().map_err(invalid)?)
        .with_bulk_enrolment(settings.bulk_enrolment().map_err(invalid)?)
        .with_purge(settings.purge().map_err(invalid)?);

    let Some(database_url) = settings.database_url() else {
        warn!("no database URL configured; serving fixture ports");
        return Ok(config);
    };

    let url = database_url.to_owned();
    let applied = tokio::task::spawn_blocking(move || apply_migrations(&url))
        .await
        .map_err(|err| io::Error::other(format!("migration task failed: {err}")))?
        .map_err(|err| io::Error::other(err.to_string()))?;
    info!(applied, "database migrations applied");

    let pool = DbPool::new(
        PoolConfig::new(database_url).with_max_size(settings.pool_max_size().map_err(invalid)?),
    )
    .await
    .map_err(|err| io::Error::other(format!("create database pool: {err}")))?;
    Ok(config.with_db_pool(pool))
}
