use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{signal, sync::mpsc};
use tracing::{error, info};

use angohost_api as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }

    // Init Redis client (construction only; connection checked in health)
    let redis_client = Arc::new(redis::Client::open(cfg.redis_url.clone())?);

    let db_arc = Arc::new(db_pool);
    let config = Arc::new(cfg);

    // Events
    let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Cart persistence survives restarts via per-session snapshot files
    let cart_storage: Arc<dyn api::cart::CartStorage> =
        Arc::new(api::cart::FileCartStorage::new(&config.cart_storage_dir));

    // Live EMIS portal when a frame token is configured, simulated otherwise
    let gateway: Arc<dyn api::services::commerce::PaymentGateway> =
        match config.payment_gateway_token.clone() {
            Some(token) => Arc::new(api::services::commerce::EmisGatewayClient::new(
                config.payment_gateway_url.clone(),
                token,
                config.payment_gateway_secret.clone(),
            )),
            None => {
                info!("No payment gateway token configured; using the simulated gateway");
                Arc::new(api::services::commerce::SimulatedGateway)
            }
        };

    let services = api::services::AppServices::build(
        db_arc.clone(),
        config.clone(),
        event_sender.clone(),
        cart_storage,
        gateway,
    );

    let app_state = Arc::new(api::AppState {
        db: db_arc,
        config: config.clone(),
        event_sender,
        services,
        redis: redis_client.clone(),
    });

    // Full router plus the global rate limiter
    let rl_cfg = api::rate_limiter::RateLimitConfig {
        requests_per_window: config.rate_limit_requests_per_window,
        window_duration: Duration::from_secs(config.rate_limit_window_seconds),
        enable_headers: config.rate_limit_enable_headers,
    };
    let rl_backend = if config.rate_limit_use_redis {
        api::rate_limiter::RateLimitBackend::Redis {
            client: redis_client,
            namespace: config.rate_limit_namespace.clone(),
        }
    } else {
        api::rate_limiter::RateLimitBackend::InMemory
    };
    let app = api::app(app_state).layer(api::rate_limiter::RateLimitLayer::new(
        rl_cfg, rl_backend,
    ));

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("angohost-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
