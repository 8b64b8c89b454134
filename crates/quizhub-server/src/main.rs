mod config;

use std::sync::Arc;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use quizhub_api::llm::{MistralClient, QuizGenerator};
use quizhub_api::{AppStateInner, build_router};
use quizhub_core::Services;
use quizhub_core::subscription::PlanLimits;
use quizhub_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizhub=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path)?);
    info!("Database ready at {}", config.db_path.display());

    let generator: Option<Arc<dyn QuizGenerator>> = match &config.llm {
        Some(llm) => Some(Arc::new(MistralClient::new(
            llm.api_key.clone(),
            llm.url.clone(),
            llm.model.clone(),
        )?)),
        None => {
            warn!("QUIZHUB_LLM_API_KEY not set, quiz generation is disabled");
            None
        }
    };
    if config.billing_secret.is_none() {
        warn!("QUIZHUB_BILLING_SECRET not set, the billing webhook is disabled");
    }
    if config.expose_reset_tokens {
        warn!("QUIZHUB_EXPOSE_RESET_TOKENS is on, reset tokens are returned to callers. Never enable in production");
    }

    let state = Arc::new(AppStateInner {
        services: Services::new(db, PlanLimits::default()),
        jwt_secret: config.jwt_secret.clone(),
        token_ttl: chrono::Duration::minutes(config.token_ttl_minutes),
        generator,
        billing_secret: config.billing_secret.clone(),
        expose_reset_tokens: config.expose_reset_tokens,
    });

    let app = build_router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("QuizHub server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            ctrl_c.await.ok();
            info!("Received Ctrl+C, shutting down...");
            return;
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
