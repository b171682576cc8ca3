use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reqwest::Client;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::ack;
use crate::commands::{BackgroundTasks, Dispatch, InteractionDispatcher};
use crate::config::Config;
use crate::directory::DirectoryClient;
use crate::security::audit_log::AuditLogger;
use crate::security::service_account::ServiceAccountCredential;
use crate::security::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::security::token_issuer::TokenIssuer;
use crate::transport::followup::FollowupClient;
use crate::transport::Interaction;

type SharedState = Arc<AppState>;

/// Outbound request timeout for token, directory and follow-up calls.
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct AppState {
    pub skip_verify: bool,
    pub verifier: SignatureVerifier,
    pub dispatcher: InteractionDispatcher,
    pub tasks: BackgroundTasks,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .context("building HTTP client")?;

        let credential = ServiceAccountCredential::from_config(&config.google);
        let tokens = TokenIssuer::new(credential, config.google.token_url.clone(), http.clone())
            .context("loading service account key")?;
        let directory = DirectoryClient::new(
            config.google.api_base.clone(),
            config.google.customer.clone(),
            tokens,
            http.clone(),
        );
        let followup = FollowupClient::new(
            config.discord.api_base.clone(),
            config.discord.app_id.clone(),
            config.discord.bot_token.clone(),
            http,
        );

        Ok(Self::new(
            SignatureVerifier::new(&config.discord.public_key),
            InteractionDispatcher::new(directory, followup),
            config.skip_verify,
        ))
    }

    pub fn new(verifier: SignatureVerifier, dispatcher: InteractionDispatcher, skip_verify: bool) -> Self {
        if skip_verify {
            warn!("signature verification is disabled; accept this only for local testing");
        }
        Self {
            skip_verify,
            verifier,
            dispatcher,
            tasks: BackgroundTasks::new(),
            audit: AuditLogger::new(),
        }
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn interactions(State(state): State<SharedState>, headers: HeaderMap, body: Bytes) -> Response {
    let timestamp = header(&headers, TIMESTAMP_HEADER);
    let signature = header(&headers, SIGNATURE_HEADER);

    if state.skip_verify {
        state.audit.verification_bypassed();
    } else {
        match state.verifier.check(&body, timestamp, signature) {
            Ok(()) => state.audit.signature_valid(timestamp.unwrap_or_default()),
            Err(reason) => {
                state.audit.signature_invalid(&reason.to_string());
                return (StatusCode::UNAUTHORIZED, "Bad signature").into_response();
            }
        }
    }

    let interaction: Interaction = match serde_json::from_slice(&body) {
        Ok(interaction) => interaction,
        Err(e) => {
            debug!(error = %e, "interaction body is not valid JSON");
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    let dispatch = state.dispatcher.dispatch(&interaction);
    let Some(reply) = dispatch.response() else {
        debug!(kind = interaction.kind, "unsupported interaction type");
        return (StatusCode::BAD_REQUEST, "Unsupported interaction").into_response();
    };

    let Dispatch::Defer(task) = dispatch else {
        return Json(reply).into_response();
    };

    // Follow-ups are refused for an interaction that has not been
    // acknowledged, so the task waits for the reply body to go out first.
    let (response, acknowledged) = ack::gate(Json(reply).into_response());
    info!(interaction_id = %task.interaction_id, "command deferred");
    let worker = state.clone();
    state.tasks.spawn(async move {
        acknowledged.wait().await;
        let outcome = worker.dispatcher.run(task).await;
        debug!(?outcome, "deferred task finished");
    });

    response
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/interactions", post(interactions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C, then wait for outstanding follow-ups before returning.
pub async fn serve(config: Config, port: u16) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    let pending = state.tasks.pending();
    if pending > 0 {
        info!(pending, "waiting for deferred tasks");
    }
    state.tasks.drain().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
