//! boost-gateway server entry point.
//!
//! Wires the stores, the social platform client, the background dispatcher
//! and the Axum HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use boost_gateway::api;
use boost_gateway::app_state::AppState;
use boost_gateway::config::GatewayConfig;
use boost_gateway::persistence::{BalanceLedger, MemoryStore, PostgresStore, RecordStore};
use boost_gateway::service::{
    BoostService, Dispatcher, LogNotifier, Notifier, PublishPolicy, WebhookNotifier,
};
use boost_gateway::social::{
    AccountRegistry, EngagementAmplifier, HttpSocialClient, SocialClient, SocialPoster,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting boost-gateway");

    // Build persistence layer
    let (records, ledger): (Arc<dyn RecordStore>, Arc<dyn BalanceLedger>) =
        if config.persistence_enabled {
            let store = Arc::new(
                PostgresStore::connect(&config)
                    .await
                    .context("connecting to PostgreSQL")?,
            );
            tracing::info!("using PostgreSQL persistence");
            (
                Arc::clone(&store) as Arc<dyn RecordStore>,
                store as Arc<dyn BalanceLedger>,
            )
        } else {
            tracing::warn!("persistence disabled, records and balances live in memory");
            let store = Arc::new(MemoryStore::new());
            (
                Arc::clone(&store) as Arc<dyn RecordStore>,
                store as Arc<dyn BalanceLedger>,
            )
        };

    // Build social layer
    let social = &config.social;
    if social.accounts.is_empty() {
        tracing::warn!("no social accounts configured, every boost will fail");
    }
    let client: Arc<dyn SocialClient> = Arc::new(
        HttpSocialClient::new(&social.api_base, social.request_timeout)
            .map_err(|e| anyhow::anyhow!("building social client: {e}"))?,
    );
    let registry = Arc::new(AccountRegistry::new(social.accounts.clone()));
    let poster = Arc::new(SocialPoster::new(Arc::clone(&client), Arc::clone(&registry)));
    let amplifier = social.amplify_enabled.then(|| {
        Arc::new(EngagementAmplifier::new(
            Arc::clone(&client),
            Arc::clone(&registry),
            social.amplify_action_delay,
            social.amplify_reply_text.clone(),
        ))
    });

    // Build background dispatcher
    let notifier: Arc<dyn Notifier> = match config.notify_webhook_url.as_deref() {
        Some(url) => Arc::new(
            WebhookNotifier::new(url, social.request_timeout).context("building notifier")?,
        ),
        None => Arc::new(LogNotifier),
    };
    let (dispatcher, worker) =
        Dispatcher::spawn(config.dispatch_queue_capacity, amplifier, notifier);

    // Build service layer
    let policy = PublishPolicy::from_config(social);
    tracing::info!(
        primary = %policy.primary_account,
        accounts = registry.len(),
        retries = policy.retries,
        "social posting configured"
    );
    let boost_service = Arc::new(BoostService::new(
        records,
        ledger,
        poster,
        dispatcher,
        policy,
        config.rewards,
    ));

    // Build application state
    if config.allow_insecure {
        if config.api_key.is_none() {
            tracing::warn!("ALLOW_INSECURE set and API_KEY missing, operator endpoints are unauthenticated");
        }
        if config.webhook_signing_secret.is_none() {
            tracing::warn!("ALLOW_INSECURE set and WEBHOOK_SIGNING_SECRET missing, webhook signatures are not verified");
        }
    }
    let app_state = AppState {
        boost_service,
        api_key: config.api_key.as_deref().map(Arc::from),
        webhook_secret: config.webhook_signing_secret.as_deref().map(Arc::from),
        webhook_tolerance_secs: config.webhook_tolerance_secs,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the router released every dispatcher; let queued work finish.
    if let Err(err) = worker.await {
        tracing::error!(error = %err, "background worker ended abnormally");
    }
    tracing::info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
