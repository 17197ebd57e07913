use quillpad_common::util::PositiveDuration;
use quillpad_db::client::{DbClient, DbError};
use serde::Deserialize;
use server::{ServerState, Settings};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};
use templates::{
    TemplateRenderer,
    markdown::{MarkdownError, MarkdownRenderer},
};
use thiserror::Error;
use time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;
mod templates;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("SESSION_LIFETIME_HOURS must be positive, got {0}")]
    SessionLifetime(i64),
    #[error("Error opening database: {0}")]
    Database(#[from] DbError),
    #[error("Error loading templates: {0}")]
    Templates(#[from] tera::Error),
    #[error("Error preparing syntax highlighting: {0}")]
    Markdown(#[from] MarkdownError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

fn default_database_max_connections() -> u32 {
    5
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_database_max_connections")]
    database_max_connections: u32,
    #[serde(default)]
    admin_usernames: Vec<String>,
    session_lifetime_hours: Option<i64>,
    #[serde(default)]
    secure_cookies: bool,
}

impl Env {
    fn settings(&self) -> Result<Settings, InitError> {
        let session_lifetime = self
            .session_lifetime_hours
            .map(|hours| {
                PositiveDuration::new(Duration::hours(hours)).ok_or(InitError::SessionLifetime(hours))
            })
            .transpose()?;

        Ok(Settings {
            staff: self.admin_usernames.iter().cloned().collect(),
            session_lifetime,
            secure_cookies: self.secure_cookies,
        })
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "quillpad_web=debug,\
                quillpad_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(%err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    let settings = env.settings()?;

    let db_client = DbClient::connect(&env.database_url, env.database_max_connections).await?;
    let markdown = MarkdownRenderer::new()?;
    let templates = TemplateRenderer::new(Arc::new(markdown))?;

    let state = ServerState {
        db_client: Arc::new(db_client),
        templates: Arc::new(templates),
        settings: Arc::new(settings),
    };

    let tracing_layer = TraceLayer::new_for_http();
    let app = server::routes().layer(tracing_layer).with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
