use std::sync::Arc;

use actix_cors::Cors;
use actix_identity::IdentityMiddleware;
use actix_session::{
    config::{CookieContentSecurity, PersistentSession},
    SessionMiddleware,
};
use actix_web::{
    cookie::Key,
    middleware::{NormalizePath, TrailingSlash},
    web::{Data, ServiceConfig},
    App, HttpServer,
};
use auth::{
    middleware::{bearer::BearerAuth, protected_route::Protected},
    session::SqliteSessionStore,
};
use base64::Engine;
use chrono::TimeDelta;
use config::Config;
use eyre::WrapErr;
use mail::MailProvider;
use secrecy::ExposeSecret;
use tracing::level_filters::LevelFilter;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter, FmtSubscriber};

pub mod api;
pub mod auth;
pub mod campaign;
pub mod clock;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod mail;
pub mod message;
pub mod ratelimit;
pub mod service;

pub const SESSION_EXPIRATION: TimeDelta = TimeDelta::hours(1);

const SESSION_COOKIE: &str = "outreach_session";
const IDENTITY_KEY: &str = "outreach_id";

/// Registers every route with its access rules.
pub fn routes(cfg: &mut ServiceConfig) {
    cfg.service(api::jobs::service().wrap(Protected::authenticated().allow_system()))
        .service(api::campaigns::service().wrap(Protected::authenticated()))
        .service(api::admin::service().wrap(Protected::admin_only()))
        .service(api::auth::service());
}

pub fn session_middleware(
    store: SqliteSessionStore,
    key: Key,
) -> SessionMiddleware<SqliteSessionStore> {
    let ttl = actix_web::cookie::time::Duration::seconds(SESSION_EXPIRATION.num_seconds());

    SessionMiddleware::builder(store, key)
        .cookie_secure(true)
        .cookie_content_security(CookieContentSecurity::Signed)
        .session_lifecycle(PersistentSession::default().session_ttl(ttl))
        .cookie_http_only(true)
        .cookie_name(SESSION_COOKIE.to_owned())
        .build()
}

pub fn identity_middleware() -> IdentityMiddleware {
    IdentityMiddleware::builder()
        .visit_deadline(SESSION_EXPIRATION.to_std().ok())
        .logout_behaviour(actix_identity::config::LogoutBehaviour::PurgeSession)
        .id_key(IDENTITY_KEY)
        .build()
}

/// Cookie signing key from `OUTREACH_SESSION_KEY`, or a fresh one that
/// invalidates sessions on every restart.
fn session_key(config: &Config) -> eyre::Result<Key> {
    let Some(secret) = config.session_key.as_ref() else {
        tracing::warn!("OUTREACH_SESSION_KEY is not set, sessions will not survive a restart");
        return Ok(Key::generate());
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(secret.expose_secret())
        .wrap_err("OUTREACH_SESSION_KEY is not valid base64")?;

    if bytes.len() < 32 {
        eyre::bail!("OUTREACH_SESSION_KEY must decode to at least 32 bytes");
    }

    Ok(Key::derive_from(&bytes))
}

/// Returns a builder for the main application.
#[bon::builder(finish_fn = start)]
pub async fn run(config: Option<Config>, mailer: Option<Arc<dyn MailProvider>>) -> eyre::Result<()> {
    #[cfg(debug_assertions)]
    FmtSubscriber::builder()
        .pretty()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("OUTREACH_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    #[cfg(not(debug_assertions))]
    FmtSubscriber::builder()
        .json()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("OUTREACH_LOG")
                .with_default_directive(LevelFilter::INFO.into())
                .from_env()?,
        )
        .finish()
        .try_init()?;

    let config = match config {
        Some(config) => config,
        None => Config::load()?,
    };

    let secret_key = session_key(&config)?;
    let bind = (config.bind_host().to_owned(), config.port());

    let service = service::Service::connect_with()
        .config(config)
        .maybe_mailer(mailer)
        .call()
        .await?;

    let session_store = SqliteSessionStore::new(service.db().clone());

    let data = Data::new(service);

    {
        let data = data.clone();
        actix_web::rt::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down, cancelling in-flight deliveries");
                data.dispatcher().shutdown();
            }
        });
    }

    tracing::info!(host = %bind.0, port = bind.1, "starting server");

    HttpServer::new(move || {
        let cors = Cors::default()
            .supports_credentials()
            .allow_any_origin()
            .allow_any_header()
            .allow_any_method();

        App::new()
            .wrap(TracingLogger::default())
            .wrap(BearerAuth)
            .wrap(identity_middleware())
            .wrap(session_middleware(session_store.clone(), secret_key.clone()))
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(cors)
            .configure(routes)
            .app_data(data.clone())
            .app_data(api::json_config())
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
